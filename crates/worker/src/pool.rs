use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{error, info};

use crate::worker::Worker;

/// 工作进程池
///
/// 启动若干个相同配置的工作进程，每个跑自己的轮询循环。
/// `stop` 广播停止信号后等待所有实例退出，在途作业不被打断。
pub struct WorkerPool {
    worker: Arc<Worker>,
    concurrency: usize,
    shutdown_tx: broadcast::Sender<()>,
    tasks: JoinSet<()>,
}

impl WorkerPool {
    pub fn new(worker: Worker, concurrency: usize) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            worker: Arc::new(worker),
            concurrency: concurrency.max(1),
            shutdown_tx,
            tasks: JoinSet::new(),
        }
    }

    /// 启动所有工作进程
    pub fn start(&mut self) {
        for _ in 0..self.concurrency {
            let worker = self.worker.clone();
            let shutdown_rx = self.shutdown_tx.subscribe();
            self.tasks.spawn(async move {
                worker.run(shutdown_rx).await;
            });
        }
        info!("已启动 {} 个工作进程", self.concurrency);
    }

    /// 广播停止信号并等待所有工作进程退出
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        self.wait().await;
    }

    /// 等待所有工作进程自然退出（达到运行上限时使用）
    pub async fn wait(&mut self) {
        while let Some(result) = self.tasks.join_next().await {
            if let Err(e) = result {
                error!("工作进程异常退出: {e}");
            }
        }
        info!("所有工作进程已退出");
    }
}
