use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tracing::{info, warn};

use workq_core::config::{AppConfig, QueueConfig};
use workq_core::traits::DistributedLocker;
use workq_infrastructure::{MemoryLocker, QueueManager, RedisLocker};
use workq_scheduler::Scheduler;
use workq_worker::{HandlerRegistry, Worker, WorkerOptions, WorkerPool};

use crate::commands::{EchoJobHandler, QueueStatsCommand};

/// 运行模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    /// 只跑工作进程池
    Worker,
    /// 只跑定时调度器
    Scheduler,
    /// 两者都跑
    All,
    /// 打印队列状态后退出
    Status,
}

impl AppMode {
    pub fn parse(mode: &str) -> Result<Self> {
        match mode {
            "worker" => Ok(AppMode::Worker),
            "scheduler" => Ok(AppMode::Scheduler),
            "all" => Ok(AppMode::All),
            "status" => Ok(AppMode::Status),
            other => anyhow::bail!("无效的运行模式: {other}"),
        }
    }
}

/// 应用实例：按配置装配管理器、工作进程池和调度器
pub struct Application {
    config: AppConfig,
    mode: AppMode,
}

impl Application {
    pub fn new(config: AppConfig, mode: AppMode) -> Self {
        Self { config, mode }
    }

    pub async fn run(self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        let manager = QueueManager::connect(&self.config.queue)
            .await
            .context("连接队列后端失败")?;

        if self.mode == AppMode::Status {
            return self.print_status(&manager).await;
        }

        let mut pool = None;
        let mut scheduler = None;

        if matches!(self.mode, AppMode::Worker | AppMode::All) {
            let mut registry = HandlerRegistry::new();
            registry.register(Arc::new(EchoJobHandler));

            let worker = Worker::new(
                manager.clone(),
                Arc::new(registry),
                WorkerOptions::from_config(&self.config.worker),
            );
            let mut p = WorkerPool::new(worker, self.config.worker.concurrency);
            p.start();
            pool = Some(p);
        }

        if matches!(self.mode, AppMode::Scheduler | AppMode::All) {
            let locker = self.build_locker().await?;
            let lock_ttl = Duration::from_secs(self.config.scheduler.lock_ttl_seconds);

            let mut s = Scheduler::new(locker, lock_ttl);
            let stats = QueueStatsCommand::new(manager.clone(), self.config.worker.queues.clone());
            s.task("queue:stats", stats)
                .every_five_minutes()
                .unique()
                .register();
            s.start().context("启动调度器失败")?;
            scheduler = Some(s);
        }

        // 等待关闭信号
        let _ = shutdown_rx.recv().await;
        info!("开始优雅关闭...");

        if let Some(mut s) = scheduler {
            s.stop().await;
        }
        if let Some(mut p) = pool {
            p.stop().await;
        }

        info!("应用已退出");
        Ok(())
    }

    async fn print_status(&self, manager: &QueueManager) -> Result<()> {
        for queue in &self.config.worker.queues {
            let size = manager.size(queue).await?;
            println!("{queue}\t{size}");
        }
        Ok(())
    }

    /// 唯一任务的互斥锁：Redis 驱动下用 Redis 锁，其余驱动退回
    /// 进程内锁（多实例部署时不提供跨实例互斥）。
    async fn build_locker(&self) -> Result<Arc<dyn DistributedLocker>> {
        match &self.config.queue {
            QueueConfig::Redis(c) => {
                let locker = RedisLocker::connect(&c.url)
                    .await
                    .context("连接分布式锁失败")?;
                Ok(Arc::new(locker))
            }
            _ => {
                warn!("当前驱动没有共享存储锁，唯一任务只在本进程内互斥");
                Ok(Arc::new(MemoryLocker::new()))
            }
        }
    }
}
