use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use workq_core::errors::{Result, WorkqError};
use workq_core::traits::DistributedLocker;
use workq_infrastructure::MemoryLocker;
use workq_scheduler::{Command, Scheduler};

struct CountingCommand {
    calls: Arc<AtomicU32>,
    duration: Duration,
}

#[async_trait]
impl Command for CountingCommand {
    fn name(&self) -> &str {
        "counting"
    }

    async fn handle(&self) -> Result<()> {
        tokio::time::sleep(self.duration).await;
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FailingCommand {
    calls: Arc<AtomicU32>,
}

#[async_trait]
impl Command for FailingCommand {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(WorkqError::Internal("boom".to_string()))
    }
}

fn scheduler(locker: Arc<MemoryLocker>) -> Scheduler {
    Scheduler::new(locker, Duration::from_secs(10))
}

#[tokio::test]
async fn test_unique_task_runs_on_exactly_one_instance() {
    // 两个调度器实例共享同一把锁，模拟两台机器的同一次触发
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let command = Arc::new(CountingCommand {
        calls: calls.clone(),
        duration: Duration::from_millis(100),
    });

    let mut s1 = scheduler(locker.clone());
    s1.task("sync", command.clone()).every_minute().unique().register();
    let mut s2 = scheduler(locker.clone());
    s2.task("sync", command.clone()).every_minute().unique().register();

    let (r1, r2) = tokio::join!(s1.run_now("sync"), s2.run_now("sync"));
    r1.unwrap();
    r2.unwrap();

    // 恰好一个实例执行了命令体
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 双方都结束后锁已释放
    assert!(locker
        .try_lock("scheduler:lock:sync", Duration::from_secs(1))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_non_unique_task_runs_on_every_instance() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let command = Arc::new(CountingCommand {
        calls: calls.clone(),
        duration: Duration::from_millis(50),
    });

    let mut s1 = scheduler(locker.clone());
    s1.task("local", command.clone()).every_minute().register();
    let mut s2 = scheduler(locker.clone());
    s2.task("local", command.clone()).every_minute().register();

    let (r1, r2) = tokio::join!(s1.run_now("local"), s2.run_now("local"));
    r1.unwrap();
    r2.unwrap();

    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_failed_unique_task_still_releases_lock() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut s = scheduler(locker.clone());
    s.task("flaky", Arc::new(FailingCommand { calls: calls.clone() }))
        .every_minute()
        .unique()
        .register();

    s.run_now("flaky").await.unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    // 命令失败不影响锁的释放
    assert!(locker
        .try_lock("scheduler:lock:flaky", Duration::from_secs(1))
        .await
        .unwrap());
}

#[tokio::test]
async fn test_command_error_keeps_task_registered() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));

    let mut s = scheduler(locker);
    s.task("flaky", Arc::new(FailingCommand { calls: calls.clone() }))
        .every_minute()
        .register();

    s.run_now("flaky").await.unwrap();
    s.run_now("flaky").await.unwrap();
    // 每次触发都照常执行，失败不会注销任务
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_run_now_unknown_task_errors() {
    let s = scheduler(Arc::new(MemoryLocker::new()));
    assert!(s.run_now("nope").await.is_err());
}

#[tokio::test]
async fn test_builder_compiles_shorthands_to_cron() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));
    let command = || {
        Arc::new(CountingCommand {
            calls: calls.clone(),
            duration: Duration::ZERO,
        })
    };

    let mut s = scheduler(locker);
    s.task("a", command()).every_minute().register();
    s.task("b", command()).every_five_minutes().register();
    s.task("c", command()).every_ten_minutes().register();
    s.task("d", command()).every_thirty_minutes().register();
    s.task("e", command()).hourly().register();
    s.task("f", command()).daily().register();
    s.task("g", command()).daily_at("14:30").register();
    s.task("h", command()).weekly().register();
    s.task("i", command()).monthly().register();
    s.task("j", command()).cron("15 3 * * 1").register();

    let expressions: Vec<_> = s.tasks().iter().map(|t| t.expression.as_str()).collect();
    assert_eq!(
        expressions,
        vec![
            "* * * * *",
            "*/5 * * * *",
            "*/10 * * * *",
            "*/30 * * * *",
            "0 * * * *",
            "0 0 * * *",
            "30 14 * * *",
            "0 0 * * SUN",
            "0 0 1 * *",
            "15 3 * * 1",
        ]
    );
}

#[tokio::test]
async fn test_duplicate_task_name_is_ignored() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));
    let command = Arc::new(CountingCommand {
        calls,
        duration: Duration::ZERO,
    });

    let mut s = scheduler(locker);
    s.task("dup", command.clone()).every_minute().register();
    s.task("dup", command).hourly().register();

    assert_eq!(s.tasks().len(), 1);
    assert_eq!(s.tasks()[0].expression, "* * * * *");
}

#[tokio::test]
async fn test_start_rejects_invalid_expression() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));
    let command = Arc::new(CountingCommand {
        calls,
        duration: Duration::ZERO,
    });

    let mut s = scheduler(locker);
    s.task("bad", command).cron("not valid").register();
    assert!(s.start().is_err());
}

#[tokio::test]
async fn test_start_rejects_missing_expression() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));
    let command = Arc::new(CountingCommand {
        calls,
        duration: Duration::ZERO,
    });

    let mut s = scheduler(locker);
    s.task("no-schedule", command).register();
    assert!(s.start().is_err());
}

#[tokio::test]
async fn test_start_and_stop() {
    let locker = Arc::new(MemoryLocker::new());
    let calls = Arc::new(AtomicU32::new(0));
    let command = Arc::new(CountingCommand {
        calls,
        duration: Duration::ZERO,
    });

    let mut s = scheduler(locker);
    s.task("tick", command).every_minute().register();
    s.start().unwrap();

    // 停止应迅速返回，不等待下一次触发
    tokio::time::timeout(Duration::from_secs(2), s.stop())
        .await
        .expect("stop did not return promptly");
}
