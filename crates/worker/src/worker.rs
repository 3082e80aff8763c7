use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use workq_core::config::WorkerConfig;
use workq_core::errors::{Result, WorkqError};
use workq_core::models::Job;
use workq_infrastructure::QueueManager;

use crate::registry::HandlerRegistry;

/// 工作进程选项
#[derive(Debug, Clone)]
pub struct WorkerOptions {
    /// 监听的队列，按顺序扫描
    pub queues: Vec<String>,
    /// 所有队列为空时的休眠时间
    pub sleep: Duration,
    /// 处理的最大作业数，0 表示不限
    pub max_jobs: u64,
    /// 最长运行时间，零表示不限
    pub max_time: Duration,
    /// 每个作业之间的间歇，用于限流
    pub rest: Duration,
    /// 常驻内存上限（MB），0 表示不限。轮询检查，不抢占。
    pub memory_limit_mb: u64,
    /// 默认最大尝试次数，可被作业自身策略覆盖
    pub tries: u32,
    /// 默认执行超时，可被作业自身策略覆盖
    pub timeout: Duration,
}

impl Default for WorkerOptions {
    fn default() -> Self {
        Self {
            queues: vec!["default".to_string()],
            sleep: Duration::from_secs(3),
            max_jobs: 0,
            max_time: Duration::ZERO,
            rest: Duration::ZERO,
            memory_limit_mb: 128,
            tries: 3,
            timeout: Duration::from_secs(60),
        }
    }
}

impl WorkerOptions {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            queues: config.queues.clone(),
            sleep: Duration::from_secs(config.sleep_seconds),
            max_jobs: config.max_jobs,
            max_time: Duration::from_secs(config.max_time_seconds),
            rest: Duration::from_millis(config.rest_ms),
            memory_limit_mb: config.memory_limit_mb,
            tries: config.tries,
            timeout: Duration::from_secs(config.timeout_seconds),
        }
    }
}

enum Outcome {
    Success,
    Failed,
}

/// 队列工作进程
///
/// 单循环：依次扫描绑定的队列取一个作业，带截止时间执行，
/// 成功删除、失败按退避释放；全部为空时休眠。并发由运行多个
/// Worker 实例实现，见 [`crate::pool::WorkerPool`]。
pub struct Worker {
    manager: QueueManager,
    registry: Arc<HandlerRegistry>,
    options: WorkerOptions,
}

impl Worker {
    pub fn new(manager: QueueManager, registry: Arc<HandlerRegistry>, options: WorkerOptions) -> Self {
        Self {
            manager,
            registry,
            options,
        }
    }

    /// 运行主循环，直到收到停止信号或达到运行上限。
    /// 停止是协作式的：信号在两个作业之间检查，不打断正在执行的作业。
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) {
        let started = Instant::now();
        let mut processed: u64 = 0;
        info!("工作进程启动，监听队列: {:?}", self.options.queues);

        loop {
            match shutdown.try_recv() {
                Err(broadcast::error::TryRecvError::Empty) => {}
                _ => {
                    info!("收到停止信号，工作进程退出");
                    break;
                }
            }

            if self.options.max_jobs > 0 && processed >= self.options.max_jobs {
                info!("达到最大作业数 {}，工作进程退出", self.options.max_jobs);
                break;
            }

            if self.options.max_time > Duration::ZERO && started.elapsed() >= self.options.max_time {
                info!(
                    "达到最长运行时间 {:?}，工作进程退出",
                    self.options.max_time
                );
                break;
            }

            if self.options.memory_limit_mb > 0 {
                if let Some(rss_mb) = current_rss_mb() {
                    if rss_mb > self.options.memory_limit_mb {
                        warn!(
                            "内存超出上限 ({rss_mb}MB / {}MB)，工作进程退出",
                            self.options.memory_limit_mb
                        );
                        break;
                    }
                }
            }

            match self.process_next_job().await {
                Ok(true) => {
                    processed += 1;
                    if self.options.rest > Duration::ZERO {
                        tokio::time::sleep(self.options.rest).await;
                    }
                }
                Ok(false) => {
                    // 所有队列为空，休眠期间仍响应停止信号
                    tokio::select! {
                        _ = shutdown.recv() => {
                            info!("收到停止信号，工作进程退出");
                            break;
                        }
                        _ = tokio::time::sleep(self.options.sleep) => {}
                    }
                }
                Err(e) => {
                    error!("处理作业出错: {e}");
                }
            }
        }

        info!("工作进程已退出，共处理 {processed} 个作业");
    }

    /// 扫描所有队列取一个作业处理。返回 `Ok(false)` 表示全部为空。
    async fn process_next_job(&self) -> Result<bool> {
        for queue in &self.options.queues {
            let job = match self.manager.pop(queue).await {
                Ok(job) => job,
                Err(WorkqError::QueueEmpty) => continue,
                Err(e) => {
                    // 瞬时存储错误不中断循环
                    warn!("从队列 {queue} 取作业失败: {e}");
                    continue;
                }
            };

            if let Err(e) = self.process_job(queue, job).await {
                error!("队列 {queue} 的作业处理失败: {e}");
            }
            return Ok(true);
        }

        Ok(false)
    }

    async fn process_job(&self, queue: &str, mut job: Job) -> Result<()> {
        let timeout = if job.timeout > Duration::ZERO {
            job.timeout
        } else {
            self.options.timeout
        };
        let tries = if job.max_attempts > 0 {
            job.max_attempts
        } else {
            self.options.tries
        };

        debug!(
            "执行作业 {} (类型 {}, 第 {} 次尝试)",
            job.id,
            job.job_type,
            job.attempts + 1
        );

        let outcome = match self.registry.get(&job.job_type) {
            Some(handler) => {
                let job_for_handler = job.clone();
                // 在独立任务里执行，处理器 panic 只波及该作业
                let mut task =
                    tokio::spawn(async move { handler.handle(&job_for_handler).await });

                match tokio::time::timeout(timeout, &mut task).await {
                    Ok(Ok(Ok(()))) => Outcome::Success,
                    Ok(Ok(Err(e))) => {
                        warn!("作业 {} 执行失败: {e}", job.id);
                        Outcome::Failed
                    }
                    Ok(Err(join_err)) => {
                        if join_err.is_panic() {
                            error!("作业 {} 的处理器 panic", job.id);
                        }
                        Outcome::Failed
                    }
                    Err(_) => {
                        task.abort();
                        warn!("作业 {} 执行超时 ({timeout:?})", job.id);
                        Outcome::Failed
                    }
                }
            }
            None => {
                warn!("作业类型 {} 没有注册处理器", job.job_type);
                Outcome::Failed
            }
        };

        match outcome {
            Outcome::Success => self.manager.delete(queue, &job).await,
            Outcome::Failed => {
                if job.attempts < tries {
                    let delay = job.retry_delay(job.attempts as usize);
                    self.manager.release(queue, &mut job, Some(delay)).await
                } else {
                    // 重试耗尽后作业被丢弃，需要死信可见性的调用方自行补充
                    warn!("作业 {} 重试次数耗尽，丢弃", job.id);
                    self.manager.delete(queue, &job).await
                }
            }
        }
    }
}

#[cfg(target_os = "linux")]
fn current_rss_mb() -> Option<u64> {
    let status = std::fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb / 1024);
        }
    }
    None
}

#[cfg(not(target_os = "linux"))]
fn current_rss_mb() -> Option<u64> {
    None
}
