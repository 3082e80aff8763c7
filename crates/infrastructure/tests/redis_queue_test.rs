//! Redis 驱动集成测试
//!
//! 需要一个可用的 Redis 实例，通过 `WORKQ_TEST_REDIS_URL` 指定
//! （例如 `redis://127.0.0.1:6379`）。未设置时测试直接跳过。

use std::time::Duration;

use serde_json::json;
use uuid::Uuid;

use workq_core::config::RedisQueueConfig;
use workq_core::errors::WorkqError;
use workq_core::models::{Job, JobOptions};
use workq_core::traits::Queue;
use workq_infrastructure::RedisQueue;

async fn redis_queue() -> Option<RedisQueue> {
    let url = std::env::var("WORKQ_TEST_REDIS_URL").ok()?;
    let config = RedisQueueConfig {
        url,
        default_queue: "default".to_string(),
    };
    Some(RedisQueue::connect(&config).await.expect("redis connect"))
}

/// 每个测试用独立的队列名，避免互相污染
fn test_queue() -> String {
    format!("test:{}", Uuid::new_v4())
}

#[tokio::test]
async fn test_push_pop_roundtrip() {
    let Some(q) = redis_queue().await else {
        eprintln!("WORKQ_TEST_REDIS_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    let payload = json!({"user_id": 7});
    let id = q
        .push(Job::new(&queue, "send_email", payload.clone(), JobOptions::default()))
        .await
        .unwrap();
    assert!(!id.is_empty());

    let popped = q.pop(&queue).await.unwrap();
    assert_eq!(popped.id, id);
    assert_eq!(popped.payload, payload);
    assert!(popped.reserved_at.is_some());

    q.delete(&queue, &popped).await.unwrap();
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_delayed_job_moves_to_ready_when_due() {
    let Some(q) = redis_queue().await else {
        eprintln!("WORKQ_TEST_REDIS_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    q.push(Job::new(
        &queue,
        "echo",
        json!({}),
        JobOptions::default().delay(Duration::from_millis(300)),
    ))
    .await
    .unwrap();

    assert!(matches!(q.pop(&queue).await, Err(WorkqError::QueueEmpty)));
    // 延迟作业计入大小
    assert_eq!(q.size(&queue).await.unwrap(), 1);

    tokio::time::sleep(Duration::from_millis(400)).await;
    let popped = q.pop(&queue).await.unwrap();
    q.delete(&queue, &popped).await.unwrap();
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_release_exhaustion_deletes() {
    let Some(q) = redis_queue().await else {
        eprintln!("WORKQ_TEST_REDIS_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    q.push(Job::new(
        &queue,
        "echo",
        json!({}),
        JobOptions::default().max_attempts(1),
    ))
    .await
    .unwrap();

    let mut popped = q.pop(&queue).await.unwrap();
    q.release(&queue, &mut popped, None).await.unwrap();

    assert_eq!(q.size(&queue).await.unwrap(), 0);
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_release_requeues_with_delay() {
    let Some(q) = redis_queue().await else {
        eprintln!("WORKQ_TEST_REDIS_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    q.push(Job::new(&queue, "echo", json!({}), JobOptions::default()))
        .await
        .unwrap();

    let mut popped = q.pop(&queue).await.unwrap();
    q.release(&queue, &mut popped, Some(Duration::from_millis(200)))
        .await
        .unwrap();
    assert_eq!(popped.attempts, 1);

    // 还没到可见时间
    assert!(matches!(q.pop(&queue).await, Err(WorkqError::QueueEmpty)));

    tokio::time::sleep(Duration::from_millis(300)).await;
    let again = q.pop(&queue).await.unwrap();
    assert_eq!(again.attempts, 1);

    q.delete(&queue, &again).await.unwrap();
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_delete_removes_from_both_locations() {
    let Some(q) = redis_queue().await else {
        eprintln!("WORKQ_TEST_REDIS_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    let mut delayed = Job::new(
        &queue,
        "echo",
        json!({}),
        JobOptions::default().delay(Duration::from_secs(60)),
    );
    delayed.id = q.push(delayed.clone()).await.unwrap();
    let mut ready = Job::new(&queue, "echo", json!({}), JobOptions::default());
    ready.id = q.push(ready.clone()).await.unwrap();

    q.delete(&queue, &delayed).await.unwrap();
    q.delete(&queue, &ready).await.unwrap();
    assert_eq!(q.size(&queue).await.unwrap(), 0);
    q.clear(&queue).await.unwrap();
}

#[tokio::test]
async fn test_size_and_clear() {
    let Some(q) = redis_queue().await else {
        eprintln!("WORKQ_TEST_REDIS_URL 未设置，跳过");
        return;
    };
    let queue = test_queue();

    for _ in 0..3 {
        q.push(Job::new(&queue, "echo", json!({}), JobOptions::default()))
            .await
            .unwrap();
    }
    assert_eq!(q.size(&queue).await.unwrap(), 3);

    q.clear(&queue).await.unwrap();
    assert_eq!(q.size(&queue).await.unwrap(), 0);
}
