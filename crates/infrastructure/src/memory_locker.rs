use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use workq_core::errors::Result;
use workq_core::traits::DistributedLocker;

/// 进程内互斥锁
///
/// 语义与 Redis 锁一致（带 TTL 的"不存在才写入"），只在单进程内
/// 生效。用于嵌入式部署和测试。
#[derive(Default)]
pub struct MemoryLocker {
    locks: Mutex<HashMap<String, Instant>>,
}

impl MemoryLocker {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DistributedLocker for MemoryLocker {
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let mut locks = self.locks.lock().await;
        locks.retain(|_, expires_at| *expires_at > now);

        if locks.contains_key(key) {
            return Ok(false);
        }
        locks.insert(key.to_string(), now + ttl);
        Ok(true)
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        let mut locks = self.locks.lock().await;
        locks.remove(key);
        Ok(())
    }

    async fn refresh(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut locks = self.locks.lock().await;
        if let Some(expires_at) = locks.get_mut(key) {
            *expires_at = Instant::now() + ttl;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_try_lock_is_exclusive() {
        let locker = MemoryLocker::new();
        assert!(locker.try_lock("a", Duration::from_secs(10)).await.unwrap());
        assert!(!locker.try_lock("a", Duration::from_secs(10)).await.unwrap());
        // 不同key互不影响
        assert!(locker.try_lock("b", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_unlock_releases() {
        let locker = MemoryLocker::new();
        assert!(locker.try_lock("a", Duration::from_secs(10)).await.unwrap());
        locker.unlock("a").await.unwrap();
        assert!(locker.try_lock("a", Duration::from_secs(10)).await.unwrap());
    }

    #[tokio::test]
    async fn test_expired_lock_can_be_reacquired() {
        let locker = MemoryLocker::new();
        assert!(locker.try_lock("a", Duration::from_millis(20)).await.unwrap());
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(locker.try_lock("a", Duration::from_millis(20)).await.unwrap());
    }

    #[tokio::test]
    async fn test_refresh_extends_ttl() {
        let locker = MemoryLocker::new();
        assert!(locker.try_lock("a", Duration::from_millis(50)).await.unwrap());
        locker.refresh("a", Duration::from_secs(10)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(80)).await;
        // 续期后仍然持有
        assert!(!locker.try_lock("a", Duration::from_secs(10)).await.unwrap());
    }
}
