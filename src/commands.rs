use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use workq_core::errors::Result;
use workq_core::models::Job;
use workq_core::traits::JobHandler;
use workq_infrastructure::QueueManager;
use workq_scheduler::Command;

/// 示例作业处理器：把载荷打到日志里
pub struct EchoJobHandler;

#[async_trait]
impl JobHandler for EchoJobHandler {
    fn name(&self) -> &str {
        "echo"
    }

    async fn handle(&self, job: &Job) -> Result<()> {
        info!("echo 作业 {}: {}", job.id, job.payload);
        Ok(())
    }
}

/// 定时汇报各队列的待处理数量
pub struct QueueStatsCommand {
    manager: QueueManager,
    queues: Vec<String>,
}

impl QueueStatsCommand {
    pub fn new(manager: QueueManager, queues: Vec<String>) -> Arc<Self> {
        Arc::new(Self { manager, queues })
    }
}

#[async_trait]
impl Command for QueueStatsCommand {
    fn name(&self) -> &str {
        "queue:stats"
    }

    async fn handle(&self) -> Result<()> {
        for queue in &self.queues {
            let size = self.manager.size(queue).await?;
            info!("队列 {queue}: {size} 个待处理作业");
        }
        Ok(())
    }
}
