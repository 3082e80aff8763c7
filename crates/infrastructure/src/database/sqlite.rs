use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, warn};

use workq_core::config::SqliteQueueConfig;
use workq_core::errors::{Result, WorkqError};
use workq_core::models::{Job, JobOptions};
use workq_core::traits::Queue;

use super::{encode_backoff, parse_row_id, JobRow};

/// 嵌入式 SQLite 队列驱动
///
/// SQLite 没有 `FOR UPDATE SKIP LOCKED`，认领用单条带条件的
/// `UPDATE ... RETURNING` 完成，等价于一次原子的条件更新。
pub struct SqliteQueue {
    pool: SqlitePool,
    default_queue: String,
}

impl SqliteQueue {
    /// 用已建立的连接池创建驱动，并确保表结构存在
    pub async fn new(pool: SqlitePool, default_queue: impl Into<String>) -> Result<Self> {
        let queue = Self {
            pool,
            default_queue: default_queue.into(),
        };
        queue.run_migrations().await?;
        Ok(queue)
    }

    /// 按配置创建嵌入式数据库，启用 WAL 和忙等待
    pub async fn connect(config: &SqliteQueueConfig) -> Result<Self> {
        let url = if config.path.starts_with("sqlite:") {
            config.path.clone()
        } else {
            format!("sqlite://{}", config.path)
        };

        let connect_options = SqliteConnectOptions::from_str(&url)
            .map_err(|e| WorkqError::Configuration(format!("无效的 sqlite 路径 {url}: {e}")))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        debug!("已创建嵌入式 SQLite 队列存储: {}", config.path);

        Self::new(pool, config.default_queue.clone()).await
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS queue_jobs (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                queue TEXT NOT NULL,
                job_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                max_attempts INTEGER NOT NULL DEFAULT 3,
                delay INTEGER NOT NULL DEFAULT 0,
                timeout INTEGER NOT NULL DEFAULT 60,
                retry_after INTEGER NOT NULL DEFAULT 60,
                backoff TEXT NOT NULL DEFAULT '[]',
                created_at DATETIME NOT NULL,
                updated_at DATETIME NOT NULL,
                reserved_at DATETIME,
                available_at DATETIME NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_queue_jobs_queue ON queue_jobs(queue)")
            .execute(&self.pool)
            .await?;
        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_queue_jobs_available_at ON queue_jobs(available_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn queue_name<'a>(&'a self, queue: &'a str) -> &'a str {
        if queue.is_empty() {
            &self.default_queue
        } else {
            queue
        }
    }

    async fn insert(&self, job: &Job, available_at: chrono::DateTime<Utc>) -> Result<String> {
        let queue = self.queue_name(&job.queue);
        let now = Utc::now();

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO queue_jobs
                (queue, job_type, payload, attempts, max_attempts, delay, timeout,
                 retry_after, backoff, created_at, updated_at, available_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            RETURNING id
            "#,
        )
        .bind(queue)
        .bind(&job.job_type)
        .bind(serde_json::to_string(&job.payload)?)
        .bind(job.attempts as i64)
        .bind(job.max_attempts as i64)
        .bind(job.delay.as_secs() as i64)
        .bind(job.timeout.as_secs() as i64)
        .bind(job.retry_after.as_secs() as i64)
        .bind(encode_backoff(&job.backoff)?)
        .bind(now)
        .bind(now)
        .bind(available_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id.to_string())
    }
}

#[async_trait]
impl Queue for SqliteQueue {
    async fn push(&self, job: Job) -> Result<String> {
        let available_at = if job.delay > Duration::ZERO {
            Utc::now()
                + chrono::Duration::from_std(job.delay).unwrap_or_else(|_| chrono::Duration::zero())
        } else {
            Utc::now()
        };
        self.insert(&job, available_at).await
    }

    async fn push_raw(
        &self,
        queue: &str,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<String> {
        let job = Job::new(self.queue_name(queue), job_type, payload, options);
        self.push(job).await
    }

    async fn later(&self, job: Job, delay: Duration) -> Result<String> {
        let available_at =
            Utc::now() + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::zero());
        self.insert(&job, available_at).await
    }

    async fn pop(&self, queue: &str) -> Result<Job> {
        let queue = self.queue_name(queue);
        let now = Utc::now();

        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE queue_jobs
            SET reserved_at = ?1, updated_at = ?1
            WHERE id = (
                SELECT id FROM queue_jobs
                WHERE queue = ?2 AND reserved_at IS NULL AND available_at <= ?3
                ORDER BY available_at ASC
                LIMIT 1
            ) AND reserved_at IS NULL
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(queue)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        let row = row.ok_or(WorkqError::QueueEmpty)?;
        row.into_job()
    }

    async fn size(&self, queue: &str) -> Result<i64> {
        let queue = self.queue_name(queue);
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM queue_jobs WHERE queue = ?1 AND reserved_at IS NULL",
        )
        .bind(queue)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn delete(&self, queue: &str, job: &Job) -> Result<()> {
        let queue = self.queue_name(queue);
        let id = parse_row_id(&job.id)?;
        sqlx::query("DELETE FROM queue_jobs WHERE queue = ?1 AND id = ?2")
            .bind(queue)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn release(&self, queue: &str, job: &mut Job, delay: Option<Duration>) -> Result<()> {
        job.attempts += 1;

        if job.is_exhausted() {
            warn!(
                "作业 {} 达到最大尝试次数 {}，删除",
                job.id, job.max_attempts
            );
            return self.delete(queue, job).await;
        }

        let next_delay = delay.unwrap_or_else(|| job.retry_delay(job.attempts as usize - 1));
        let now = Utc::now();
        let available_at =
            now + chrono::Duration::from_std(next_delay).unwrap_or_else(|_| chrono::Duration::zero());

        job.clear_reservation();
        job.available_at = available_at;

        let queue = self.queue_name(queue);
        let id = parse_row_id(&job.id)?;
        sqlx::query(
            r#"
            UPDATE queue_jobs
            SET attempts = ?1, reserved_at = NULL, available_at = ?2, updated_at = ?3
            WHERE queue = ?4 AND id = ?5
            "#,
        )
        .bind(job.attempts as i64)
        .bind(available_at)
        .bind(now)
        .bind(queue)
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn clear(&self, queue: &str) -> Result<()> {
        let queue = self.queue_name(queue);
        sqlx::query("DELETE FROM queue_jobs WHERE queue = ?1")
            .bind(queue)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
