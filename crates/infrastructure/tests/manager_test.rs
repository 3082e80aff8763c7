use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use workq_core::config::{MemoryQueueConfig, QueueConfig, SqliteQueueConfig};
use workq_core::errors::WorkqError;
use workq_core::models::{Job, JobOptions};
use workq_infrastructure::{MemoryQueue, QueueManager};

#[tokio::test]
async fn test_connect_memory_driver() {
    let config = QueueConfig::Memory(MemoryQueueConfig::default());
    let manager = QueueManager::connect(&config).await.unwrap();

    manager
        .push(Job::new("default", "echo", json!({}), JobOptions::default()))
        .await
        .unwrap();
    assert_eq!(manager.size("default").await.unwrap(), 1);
}

#[tokio::test]
async fn test_connect_sqlite_driver() {
    let dir = TempDir::new().unwrap();
    let config = QueueConfig::Sqlite(SqliteQueueConfig {
        path: dir.path().join("m.db").to_str().unwrap().to_string(),
        default_queue: "default".to_string(),
    });
    let manager = QueueManager::connect(&config).await.unwrap();

    manager
        .push(Job::new("default", "echo", json!({}), JobOptions::default()))
        .await
        .unwrap();
    let popped = manager.pop("default").await.unwrap();
    manager.delete("default", &popped).await.unwrap();
    assert_eq!(manager.size("default").await.unwrap(), 0);
}

#[tokio::test]
async fn test_manager_forwards_unchanged() {
    // 管理器是纯转发：后端的行为（包括错误）原样可见
    let manager = QueueManager::new(Arc::new(MemoryQueue::new("default")));

    assert!(matches!(
        manager.pop("default").await,
        Err(WorkqError::QueueEmpty)
    ));

    let id = manager
        .push_raw(
            "default",
            "send_email",
            json!({"to": "a@example.com"}),
            JobOptions::default().max_attempts(5),
        )
        .await
        .unwrap();
    assert!(!id.is_empty());

    let popped = manager.pop("default").await.unwrap();
    assert_eq!(popped.job_type, "send_email");
    assert_eq!(popped.max_attempts, 5);
}

#[tokio::test]
async fn test_manager_later() {
    let manager = QueueManager::new(Arc::new(MemoryQueue::new("default")));

    let job = Job::new("default", "echo", json!({}), JobOptions::default());
    manager.later(job, Duration::from_millis(150)).await.unwrap();

    assert!(matches!(
        manager.pop("default").await,
        Err(WorkqError::QueueEmpty)
    ));
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert!(manager.pop("default").await.is_ok());
}

#[tokio::test]
async fn test_manager_concurrent_producers() {
    let manager = QueueManager::new(Arc::new(MemoryQueue::new("default")));

    let mut handles = Vec::new();
    for i in 0..8 {
        let manager = manager.clone();
        handles.push(tokio::spawn(async move {
            manager
                .push(Job::new("default", "echo", json!({ "i": i }), JobOptions::default()))
                .await
                .unwrap();
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(manager.size("default").await.unwrap(), 8);
}
