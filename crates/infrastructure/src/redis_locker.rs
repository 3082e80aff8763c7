use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::debug;

use workq_core::errors::{Result, WorkqError};
use workq_core::traits::DistributedLocker;

/// Redis 分布式锁
///
/// `try_lock` 用 `SET key v NX PX ttl` 一条命令完成原子抢占，
/// 同一 key 在 TTL 窗口内至多一个实例观察到成功。
pub struct RedisLocker {
    conn: ConnectionManager,
}

impl RedisLocker {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        debug!("分布式锁已连接 Redis");
        Ok(Self::new(conn))
    }
}

#[async_trait]
impl DistributedLocker for RedisLocker {
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let acquired: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg("1")
            .arg("NX")
            .arg("PX")
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkqError::LockFailed(e.to_string()))?;
        Ok(acquired.is_some())
    }

    async fn unlock(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("DEL")
            .arg(key)
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkqError::LockFailed(e.to_string()))?;
        Ok(())
    }

    async fn refresh(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = redis::cmd("PEXPIRE")
            .arg(key)
            .arg(ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| WorkqError::LockFailed(e.to_string()))?;
        Ok(())
    }
}
