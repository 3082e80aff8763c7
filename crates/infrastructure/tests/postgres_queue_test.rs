//! PostgreSQL 驱动集成测试
//!
//! 需要一个可用的 PostgreSQL 实例，通过 `WORKQ_TEST_DATABASE_URL`
//! 指定。未设置时测试直接跳过。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use workq_core::config::DatabaseQueueConfig;
use workq_core::errors::WorkqError;
use workq_core::models::{Job, JobOptions};
use workq_core::traits::Queue;
use workq_infrastructure::PostgresQueue;

async fn postgres_queue() -> Option<PostgresQueue> {
    let url = std::env::var("WORKQ_TEST_DATABASE_URL").ok()?;
    let config = DatabaseQueueConfig {
        url,
        default_queue: "default".to_string(),
    };
    Some(PostgresQueue::connect(&config).await.expect("postgres connect"))
}

fn test_queue() -> String {
    format!("test_{}", Uuid::new_v4().simple())
}

#[tokio::test]
async fn test_push_pop_roundtrip() {
    let Some(q) = postgres_queue().await else {
        eprintln!("WORKQ_TEST_DATABASE_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    let payload = json!({"report": "daily"});
    q.push(Job::new(&queue, "build_report", payload.clone(), JobOptions::default()))
        .await
        .unwrap();

    let popped = q.pop(&queue).await.unwrap();
    assert_eq!(popped.payload, payload);
    assert!(popped.reserved_at.is_some());
    // 已认领的行不再计入待处理
    assert_eq!(q.size(&queue).await.unwrap(), 0);

    q.delete(&queue, &popped).await.unwrap();
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_release_and_exhaustion() {
    let Some(q) = postgres_queue().await else {
        eprintln!("WORKQ_TEST_DATABASE_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    q.push(Job::new(
        &queue,
        "echo",
        json!({}),
        JobOptions::default().max_attempts(2),
    ))
    .await
    .unwrap();

    let mut popped = q.pop(&queue).await.unwrap();
    q.release(&queue, &mut popped, Some(Duration::ZERO)).await.unwrap();
    assert_eq!(popped.attempts, 1);

    let mut popped = q.pop(&queue).await.unwrap();
    assert_eq!(popped.attempts, 1);
    q.release(&queue, &mut popped, None).await.unwrap();

    // 第二次释放达到最大尝试次数，作业被删除
    assert_eq!(q.size(&queue).await.unwrap(), 0);
    assert!(matches!(q.pop(&queue).await, Err(WorkqError::QueueEmpty)));
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_concurrent_pop_claims_are_exclusive() {
    let Some(q) = postgres_queue().await else {
        eprintln!("WORKQ_TEST_DATABASE_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();
    let q = Arc::new(q);

    const TOTAL: usize = 30;
    for _ in 0..TOTAL {
        q.push(Job::new(&queue, "echo", json!({}), JobOptions::default()))
            .await
            .unwrap();
    }

    let mut handles = Vec::new();
    for _ in 0..5 {
        let q = q.clone();
        let queue = queue.clone();
        handles.push(tokio::spawn(async move {
            let mut ids = Vec::new();
            loop {
                match q.pop(&queue).await {
                    Ok(popped) => ids.push(popped.id),
                    Err(WorkqError::QueueEmpty) => break,
                    Err(e) => panic!("pop failed: {e}"),
                }
            }
            ids
        }));
    }

    let mut seen = HashSet::new();
    let mut total = 0;
    for handle in handles {
        for id in handle.await.unwrap() {
            total += 1;
            assert!(seen.insert(id.clone()), "job {id} claimed twice");
        }
    }
    assert_eq!(total, TOTAL);

    q.clear(&queue).await.unwrap();
}
