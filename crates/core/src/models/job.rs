use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 队列作业
///
/// 表示一个可入队执行的工作单元，包含载荷、重试策略和调度属性。
/// 后端把 `payload` 当作不透明数据，不做任何解释；`job_type` 是
/// 处理器注册表的查找标签。
///
/// # 字段说明
///
/// - `id`: 作业唯一标识，由后端在接收时分配（生产方不设置）
/// - `queue`: 逻辑队列名，所有操作都以队列为作用域
/// - `job_type`: 作业类型标签，用于查找对应的处理器
/// - `payload`: 作业载荷，JSON 格式，后端不解释
/// - `attempts`: 已尝试次数（每次 release 递增）
/// - `max_attempts`: 最大尝试次数，达到后作业被删除
/// - `delay`: 入队时的初始延迟
/// - `timeout`: 单次执行的最长等待时间
/// - `retry_after`: 无退避表时的固定重试间隔
/// - `backoff`: 按尝试次数索引的退避表，超出部分重复最后一项
/// - `available_at`: 作业可见时间（入队时间 + delay）
/// - `reserved_at`: 被工作进程认领的时间，释放或删除时清空
/// - `created_at` / `updated_at`: 创建与最后变更时间
///
/// # 使用示例
///
/// ```rust
/// use workq_core::models::{Job, JobOptions};
/// use std::time::Duration;
/// use serde_json::json;
///
/// let job = Job::new(
///     "emails",
///     "send_welcome_email",
///     json!({"user_id": 42}),
///     JobOptions::default().max_attempts(5).timeout(Duration::from_secs(30)),
/// );
/// assert_eq!(job.attempts, 0);
/// assert!(job.reserved_at.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub queue: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub max_attempts: u32,
    pub delay: Duration,
    pub timeout: Duration,
    pub retry_after: Duration,
    pub backoff: Vec<Duration>,
    pub available_at: DateTime<Utc>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// 创建新作业。`id` 留空，由接收它的后端分配。
    pub fn new(
        queue: impl Into<String>,
        job_type: impl Into<String>,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Self {
        let now = Utc::now();
        let available_at = now
            + chrono::Duration::from_std(options.delay).unwrap_or_else(|_| chrono::Duration::zero());

        Self {
            id: String::new(),
            queue: queue.into(),
            job_type: job_type.into(),
            payload,
            attempts: 0,
            max_attempts: options.max_attempts,
            delay: options.delay,
            timeout: options.timeout,
            retry_after: options.retry_after,
            backoff: options.backoff,
            available_at,
            reserved_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// 计算第 `attempt_index` 次重试的延迟（从 0 开始计）。
    /// 退避表非空时按索引取值，越界重复最后一项；否则退回固定间隔。
    pub fn retry_delay(&self, attempt_index: usize) -> Duration {
        if self.backoff.is_empty() {
            return self.retry_after;
        }
        let idx = attempt_index.min(self.backoff.len() - 1);
        self.backoff[idx]
    }

    /// 尝试次数是否已耗尽
    pub fn is_exhausted(&self) -> bool {
        self.attempts >= self.max_attempts
    }

    /// 标记为已认领
    pub fn mark_reserved(&mut self, at: DateTime<Utc>) {
        self.reserved_at = Some(at);
        self.updated_at = at;
    }

    /// 清除认领标记
    pub fn clear_reservation(&mut self) {
        self.reserved_at = None;
        self.touch();
    }

    /// 变更时间戳
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

/// 作业选项
///
/// 构造作业时的策略参数，未设置的字段使用默认值：
/// 最多尝试 3 次，执行超时 60 秒，固定重试间隔 60 秒，
/// 退避表 [60s, 300s, 900s]。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobOptions {
    pub delay: Duration,
    pub max_attempts: u32,
    pub timeout: Duration,
    pub retry_after: Duration,
    pub backoff: Vec<Duration>,
}

impl Default for JobOptions {
    fn default() -> Self {
        Self {
            delay: Duration::ZERO,
            max_attempts: 3,
            timeout: Duration::from_secs(60),
            retry_after: Duration::from_secs(60),
            backoff: vec![
                Duration::from_secs(60),
                Duration::from_secs(300),
                Duration::from_secs(900),
            ],
        }
    }
}

impl JobOptions {
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn retry_after(mut self, retry_after: Duration) -> Self {
        self.retry_after = retry_after;
        self
    }

    pub fn backoff(mut self, backoff: Vec<Duration>) -> Self {
        self.backoff = backoff;
        self
    }
}
