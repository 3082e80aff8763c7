use thiserror::Error;

/// 作业队列错误类型定义
#[derive(Debug, Error)]
pub enum WorkqError {
    /// 队列为空。轮询方应将其视为"稍后重试"信号，而不是故障。
    #[error("队列为空")]
    QueueEmpty,

    #[error("队列已满: {name}")]
    QueueFull { name: String },

    #[error("队列不存在: {name}")]
    QueueNotFound { name: String },

    #[error("作业未找到: {id}")]
    JobNotFound { id: String },

    #[error("不支持的队列驱动: {driver}")]
    UnsupportedDriver { driver: String },

    #[error("无效的作业数据: {0}")]
    InvalidPayload(String),

    #[error("无效的CRON表达式: {expr} - {message}")]
    InvalidCron { expr: String, message: String },

    /// 锁存储故障。注意：未抢到锁不是错误，`try_lock` 返回 `Ok(false)`。
    #[error("分布式锁操作失败: {0}")]
    LockFailed(String),

    #[error("数据库错误: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis错误: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("配置错误: {0}")]
    Configuration(String),

    #[error("内部错误: {0}")]
    Internal(String),
}

impl WorkqError {
    /// 队列为空属于预期的控制信号，工作进程据此进入空闲休眠。
    pub fn is_queue_empty(&self) -> bool {
        matches!(self, WorkqError::QueueEmpty)
    }
}

/// 统一的Result类型
pub type Result<T> = std::result::Result<T, WorkqError>;
