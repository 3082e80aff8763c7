use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveTime, Utc};
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use workq_core::errors::{Result, WorkqError};
use workq_core::traits::DistributedLocker;

use crate::cron_utils::CronSchedule;

/// 定时命令
///
/// 调度器按CRON时钟调用的执行单元。失败返回错误即可，调度器
/// 记录日志后任务保持注册，下个周期照常触发。
#[async_trait]
pub trait Command: Send + Sync {
    fn name(&self) -> &str;

    async fn handle(&self) -> Result<()>;
}

/// 已注册的定时任务
pub struct ScheduledTask {
    pub name: String,
    pub expression: String,
    pub command: Arc<dyn Command>,
    /// 唯一任务：每个周期在整个集群中至多一个实例执行
    pub unique: bool,
}

/// 定时调度器
///
/// 启动时通过流式构建器注册任务集合（此后不可变），`start` 为每个
/// 任务起一个按CRON时钟触发的循环，`stop` 停止后续触发但不打断
/// 在途执行。唯一任务触发前先抢分布式锁，没抢到的实例记一条日志
/// 跳过本次，这是预期行为不是故障。
pub struct Scheduler {
    tasks: Vec<Arc<ScheduledTask>>,
    runner: Arc<TaskRunner>,
    shutdown_tx: broadcast::Sender<()>,
    handles: JoinSet<()>,
}

impl Scheduler {
    pub fn new(locker: Arc<dyn DistributedLocker>, lock_ttl: Duration) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);
        Self {
            tasks: Vec::new(),
            runner: Arc::new(TaskRunner { locker, lock_ttl }),
            shutdown_tx,
            handles: JoinSet::new(),
        }
    }

    /// 开始注册一个任务，返回流式构建器
    pub fn task(&mut self, name: impl Into<String>, command: Arc<dyn Command>) -> TaskBuilder<'_> {
        TaskBuilder {
            scheduler: self,
            name: name.into(),
            expression: String::new(),
            command,
            unique: false,
        }
    }

    pub fn tasks(&self) -> &[Arc<ScheduledTask>] {
        &self.tasks
    }

    fn add_task(&mut self, task: ScheduledTask) {
        if self.tasks.iter().any(|t| t.name == task.name) {
            warn!("任务 {} 已注册，忽略重复注册", task.name);
            return;
        }
        self.tasks.push(Arc::new(task));
    }

    /// 校验所有表达式并启动CRON时钟。任何表达式非法都会中止启动。
    pub fn start(&mut self) -> Result<()> {
        for task in &self.tasks {
            if task.expression.is_empty() {
                return Err(WorkqError::InvalidCron {
                    expr: String::new(),
                    message: format!("任务 {} 没有设置调度表达式", task.name),
                });
            }
            let schedule = CronSchedule::parse(&task.expression)?;

            let task = task.clone();
            let runner = self.runner.clone();
            let mut shutdown_rx = self.shutdown_tx.subscribe();

            self.handles.spawn(async move {
                loop {
                    let now = Utc::now();
                    let next = match schedule.next_after(now) {
                        Some(next) => next,
                        None => {
                            warn!("任务 {} 没有下一次执行时间，退出调度循环", task.name);
                            break;
                        }
                    };
                    let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                    debug!("任务 {} 下次执行: {next}", task.name);

                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(wait) => {
                            runner.run(&task).await;
                        }
                    }
                }
            });
        }

        info!("调度器已启动，注册任务 {} 个", self.tasks.len());
        Ok(())
    }

    /// 停止CRON时钟并等待调度循环退出。在途执行不被取消，
    /// 唯一任务的锁由执行方自己释放。
    pub async fn stop(&mut self) {
        let _ = self.shutdown_tx.send(());
        while let Some(result) = self.handles.join_next().await {
            if let Err(e) = result {
                error!("调度循环异常退出: {e}");
            }
        }
        info!("调度器已停止");
    }

    /// 立即触发一个已注册的任务（唯一任务照常走锁）
    pub async fn run_now(&self, name: &str) -> Result<()> {
        let task = self
            .tasks
            .iter()
            .find(|t| t.name == name)
            .ok_or_else(|| WorkqError::Internal(format!("未注册的任务: {name}")))?;
        self.runner.run(task).await;
        Ok(())
    }
}

/// 单次触发的执行逻辑
struct TaskRunner {
    locker: Arc<dyn DistributedLocker>,
    lock_ttl: Duration,
}

impl TaskRunner {
    async fn run(&self, task: &ScheduledTask) {
        if !task.unique {
            // 非唯一任务各实例独立执行
            Self::invoke(task).await;
            return;
        }

        let key = format!("scheduler:lock:{}", task.name);
        match self.locker.try_lock(&key, self.lock_ttl).await {
            Ok(true) => {
                Self::invoke(task).await;
                // 无论执行结果如何都释放锁
                if let Err(e) = self.locker.unlock(&key).await {
                    error!("释放任务 {} 的锁失败: {e}", task.name);
                }
            }
            Ok(false) => {
                info!("任务 {} 正在其他实例上执行，跳过本次", task.name);
            }
            Err(e) => {
                error!("获取任务 {} 的锁失败: {e}", task.name);
            }
        }
    }

    async fn invoke(task: &ScheduledTask) {
        match AssertUnwindSafe(task.command.handle()).catch_unwind().await {
            Ok(Ok(())) => debug!("任务 {} 执行完成", task.name),
            Ok(Err(e)) => error!("任务 {} 执行失败: {e}", task.name),
            Err(_) => error!("任务 {} 执行时 panic", task.name),
        }
    }
}

/// 任务构建器
///
/// 常用频率的简写最终都编译成5段CRON表达式。
pub struct TaskBuilder<'a> {
    scheduler: &'a mut Scheduler,
    name: String,
    expression: String,
    command: Arc<dyn Command>,
    unique: bool,
}

impl<'a> TaskBuilder<'a> {
    /// 自定义CRON表达式（分 时 日 月 周）
    pub fn cron(mut self, expression: impl Into<String>) -> Self {
        self.expression = expression.into();
        self
    }

    pub fn every_minute(self) -> Self {
        self.cron("* * * * *")
    }

    pub fn every_five_minutes(self) -> Self {
        self.cron("*/5 * * * *")
    }

    pub fn every_ten_minutes(self) -> Self {
        self.cron("*/10 * * * *")
    }

    pub fn every_thirty_minutes(self) -> Self {
        self.cron("*/30 * * * *")
    }

    pub fn hourly(self) -> Self {
        self.cron("0 * * * *")
    }

    pub fn daily(self) -> Self {
        self.cron("0 0 * * *")
    }

    /// 每天 `HH:MM` 执行
    pub fn daily_at(self, time: &str) -> Self {
        match NaiveTime::parse_from_str(time, "%H:%M") {
            Ok(t) => {
                use chrono::Timelike;
                let expr = format!("{} {} * * *", t.minute(), t.hour());
                self.cron(expr)
            }
            Err(e) => {
                warn!("无效的时间 {time}: {e}，保留原表达式");
                self
            }
        }
    }

    pub fn weekly(self) -> Self {
        // cron crate 的周字段从 SUN/1 起，不接受 0
        self.cron("0 0 * * SUN")
    }

    pub fn monthly(self) -> Self {
        self.cron("0 0 1 * *")
    }

    /// 标记为唯一任务（集群中每个周期至多一个实例执行）
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// 注册到调度器
    pub fn register(self) {
        self.scheduler.add_task(ScheduledTask {
            name: self.name,
            expression: self.expression,
            command: self.command,
            unique: self.unique,
        });
    }
}
