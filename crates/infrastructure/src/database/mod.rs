pub mod postgres;
pub mod sqlite;

use std::time::Duration;

use chrono::{DateTime, Utc};

use workq_core::errors::Result;
use workq_core::models::Job;

/// queue_jobs 表的行结构，PostgreSQL 和 SQLite 共用
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: i64,
    pub queue: String,
    pub job_type: String,
    pub payload: String,
    pub attempts: i64,
    pub max_attempts: i64,
    pub delay: i64,
    pub timeout: i64,
    pub retry_after: i64,
    pub backoff: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub available_at: DateTime<Utc>,
}

impl JobRow {
    /// 行到作业的转换。尝试次数以列为准，不信任信封里的旧值。
    pub(crate) fn into_job(self) -> Result<Job> {
        let backoff: Vec<u64> = serde_json::from_str(&self.backoff)?;

        Ok(Job {
            id: self.id.to_string(),
            queue: self.queue,
            job_type: self.job_type,
            payload: serde_json::from_str(&self.payload)?,
            attempts: self.attempts.max(0) as u32,
            max_attempts: self.max_attempts.max(0) as u32,
            delay: Duration::from_secs(self.delay.max(0) as u64),
            timeout: Duration::from_secs(self.timeout.max(0) as u64),
            retry_after: Duration::from_secs(self.retry_after.max(0) as u64),
            backoff: backoff.into_iter().map(Duration::from_secs).collect(),
            available_at: self.available_at,
            reserved_at: self.reserved_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// 退避表序列化为秒数的JSON列表
pub(crate) fn encode_backoff(backoff: &[Duration]) -> Result<String> {
    let seconds: Vec<u64> = backoff.iter().map(|d| d.as_secs()).collect();
    Ok(serde_json::to_string(&seconds)?)
}

pub(crate) fn parse_row_id(id: &str) -> Result<i64> {
    id.parse::<i64>()
        .map_err(|_| workq_core::errors::WorkqError::JobNotFound { id: id.to_string() })
}
