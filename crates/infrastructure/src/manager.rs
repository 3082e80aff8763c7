use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use workq_core::config::QueueConfig;
use workq_core::errors::Result;
use workq_core::models::{Job, JobOptions};
use workq_core::traits::Queue;

use crate::database::postgres::PostgresQueue;
use crate::database::sqlite::SqliteQueue;
use crate::memory_queue::MemoryQueue;
use crate::redis_queue::RedisQueue;

/// 队列管理器
///
/// 后端无关的门面：持有一个配置好的驱动实例，所有方法原样转发，
/// 自身不做任何业务逻辑，后端错误不加包装地向上传递。
/// 可以在多个生产方和工作进程之间并发使用。
#[derive(Clone)]
pub struct QueueManager {
    backend: Arc<dyn Queue>,
}

impl QueueManager {
    /// 用现成的后端实例创建管理器（显式依赖注入）
    pub fn new(backend: Arc<dyn Queue>) -> Self {
        Self { backend }
    }

    /// 按配置选择并连接后端
    pub async fn connect(config: &QueueConfig) -> Result<Self> {
        let backend: Arc<dyn Queue> = match config {
            QueueConfig::Redis(c) => Arc::new(RedisQueue::connect(c).await?),
            QueueConfig::Database(c) => Arc::new(PostgresQueue::connect(c).await?),
            QueueConfig::Sqlite(c) => Arc::new(SqliteQueue::connect(c).await?),
            QueueConfig::Memory(c) => Arc::new(MemoryQueue::new(c.default_queue.clone())),
        };
        info!("队列管理器已就绪，驱动: {}", config.driver_name());
        Ok(Self::new(backend))
    }

    /// 当前驱动
    pub fn backend(&self) -> Arc<dyn Queue> {
        self.backend.clone()
    }

    pub async fn push(&self, job: Job) -> Result<String> {
        self.backend.push(job).await
    }

    pub async fn push_raw(
        &self,
        queue: &str,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<String> {
        self.backend.push_raw(queue, job_type, payload, options).await
    }

    pub async fn later(&self, job: Job, delay: Duration) -> Result<String> {
        self.backend.later(job, delay).await
    }

    pub async fn pop(&self, queue: &str) -> Result<Job> {
        self.backend.pop(queue).await
    }

    pub async fn size(&self, queue: &str) -> Result<i64> {
        self.backend.size(queue).await
    }

    pub async fn delete(&self, queue: &str, job: &Job) -> Result<()> {
        self.backend.delete(queue, job).await
    }

    pub async fn release(&self, queue: &str, job: &mut Job, delay: Option<Duration>) -> Result<()> {
        self.backend.release(queue, job, delay).await
    }

    pub async fn clear(&self, queue: &str) -> Result<()> {
        self.backend.clear(queue).await
    }
}
