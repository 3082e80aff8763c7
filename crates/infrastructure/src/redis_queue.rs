use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::{debug, warn};
use uuid::Uuid;

use workq_core::config::RedisQueueConfig;
use workq_core::errors::{Result, WorkqError};
use workq_core::models::{Job, JobOptions};
use workq_core::traits::Queue;

/// 延迟集合一次搬运的最大条数
const SWEEP_BATCH: isize = 100;

/// Redis 队列驱动
///
/// 键布局：`queues:{name}` 就绪列表（LPUSH/RPOP），
/// `queues:{name}:delayed` 按可见时间计分的有序集合，
/// `queues:{name}:jobs` 作业ID到信封的哈希（用于按ID查找）。
pub struct RedisQueue {
    conn: ConnectionManager,
    default_queue: String,
}

impl RedisQueue {
    /// 用已建立的连接创建驱动
    pub fn new(conn: ConnectionManager, default_queue: impl Into<String>) -> Self {
        Self {
            conn,
            default_queue: default_queue.into(),
        }
    }

    /// 按配置建立连接，PING 验证可达后返回
    pub async fn connect(config: &RedisQueueConfig) -> Result<Self> {
        let client = redis::Client::open(config.url.as_str())?;
        let mut conn = ConnectionManager::new(client).await?;

        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        if pong != "PONG" {
            return Err(WorkqError::Internal(format!(
                "Redis PING 响应异常: {pong}"
            )));
        }
        debug!("已连接 Redis: {}", config.url);

        Ok(Self::new(conn, config.default_queue.clone()))
    }

    fn queue_name<'a>(&'a self, queue: &'a str) -> &'a str {
        if queue.is_empty() {
            &self.default_queue
        } else {
            queue
        }
    }

    fn ready_key(queue: &str) -> String {
        format!("queues:{queue}")
    }

    fn delayed_key(queue: &str) -> String {
        format!("queues:{queue}:delayed")
    }

    fn jobs_key(queue: &str) -> String {
        format!("queues:{queue}:jobs")
    }

    fn score(at: DateTime<Utc>) -> f64 {
        at.timestamp_millis() as f64 / 1000.0
    }

    async fn store(&self, mut job: Job, available_at: DateTime<Utc>) -> Result<String> {
        if job.id.is_empty() {
            job.id = Uuid::new_v4().to_string();
        }
        job.available_at = available_at;
        job.touch();

        let queue = self.queue_name(&job.queue).to_string();
        let envelope = serde_json::to_string(&job)?;
        let mut conn = self.conn.clone();

        let _: () = conn
            .hset(Self::jobs_key(&queue), &job.id, &envelope)
            .await?;

        if available_at <= Utc::now() {
            let _: () = conn.lpush(Self::ready_key(&queue), &envelope).await?;
        } else {
            let _: () = conn
                .zadd(Self::delayed_key(&queue), &envelope, Self::score(available_at))
                .await?;
        }

        Ok(job.id)
    }

    /// 把到期的延迟作业搬到就绪列表。整个扫描是尽力而为的，
    /// 但每条搬运以 ZREM 的返回值做原子判定，不会重复搬运。
    async fn promote_due(&self, queue: &str) -> Result<()> {
        let delayed_key = Self::delayed_key(queue);
        let ready_key = Self::ready_key(queue);
        let now = Self::score(Utc::now());
        let mut conn = self.conn.clone();

        let due: Vec<String> = conn
            .zrangebyscore_limit(&delayed_key, "-inf", now, 0, SWEEP_BATCH)
            .await?;

        for envelope in due {
            let removed: i64 = conn.zrem(&delayed_key, &envelope).await?;
            if removed == 1 {
                let _: () = conn.lpush(&ready_key, &envelope).await?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl Queue for RedisQueue {
    async fn push(&self, job: Job) -> Result<String> {
        let available_at = if job.delay > Duration::ZERO {
            Utc::now()
                + chrono::Duration::from_std(job.delay).unwrap_or_else(|_| chrono::Duration::zero())
        } else {
            Utc::now()
        };
        self.store(job, available_at).await
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
        self.store(job, available_at).await
    }

    async fn pop(&self, queue: &str) -> Result<Job> {
        let queue = self.queue_name(queue);
        self.promote_due(queue).await?;

        let mut conn = self.conn.clone();
        let envelope: Option<String> = conn.rpop(Self::ready_key(queue), None).await?;
        let envelope = envelope.ok_or(WorkqError::QueueEmpty)?;

        let mut job: Job = serde_json::from_str(&envelope)?;
        job.mark_reserved(Utc::now());
        Ok(job)
    }

    async fn size(&self, queue: &str) -> Result<i64> {
        let queue = self.queue_name(queue);
        let mut conn = self.conn.clone();
        let ready: i64 = conn.llen(Self::ready_key(queue)).await?;
        let delayed: i64 = conn.zcard(Self::delayed_key(queue)).await?;
        Ok(ready + delayed)
    }

    async fn delete(&self, queue: &str, job: &Job) -> Result<()> {
        let queue = self.queue_name(queue);
        let mut conn = self.conn.clone();

        // 以哈希中的信封为准：就绪和延迟结构里的成员是入队时的序列化值
        let stored: Option<String> = conn.hget(Self::jobs_key(queue), &job.id).await?;
        let envelope = match stored {
            Some(envelope) => envelope,
            None => serde_json::to_string(job)?,
        };

        let _: i64 = conn.lrem(Self::ready_key(queue), 0, &envelope).await?;
        let _: i64 = conn.zrem(Self::delayed_key(queue), &envelope).await?;
        let _: () = conn.hdel(Self::jobs_key(queue), &job.id).await?;
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
        let available_at = Utc::now()
            + chrono::Duration::from_std(next_delay).unwrap_or_else(|_| chrono::Duration::zero());

        job.clear_reservation();
        job.available_at = available_at;

        let queue = self.queue_name(queue).to_string();
        let envelope = serde_json::to_string(&job)?;
        let mut conn = self.conn.clone();

        let _: () = conn
            .hset(Self::jobs_key(&queue), &job.id, &envelope)
            .await?;
        let _: () = conn
            .zadd(Self::delayed_key(&queue), &envelope, Self::score(available_at))
            .await?;

        debug!("作业 {} 释放回队列，{:?} 后可见", job.id, next_delay);
        Ok(())
    }

    async fn clear(&self, queue: &str) -> Result<()> {
        let queue = self.queue_name(queue);
        let mut conn = self.conn.clone();
        let _: () = conn
            .del(vec![
                Self::ready_key(queue),
                Self::delayed_key(queue),
                Self::jobs_key(queue),
            ])
            .await?;
        Ok(())
    }
}
