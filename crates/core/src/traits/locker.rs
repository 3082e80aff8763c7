use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;

/// 分布式互斥锁
///
/// 基于共享存储的原子"不存在才写入"操作实现跨进程互斥。
/// `try_lock` 必须是原子的：同一key在TTL窗口内至多一个调用方得到 `true`。
#[async_trait]
pub trait DistributedLocker: Send + Sync {
    /// 尝试获取锁。抢到返回 `Ok(true)`；已被其他持有者占用返回
    /// `Ok(false)`（这不是错误）；存储故障才返回 `Err`。
    async fn try_lock(&self, key: &str, ttl: Duration) -> Result<bool>;

    /// 释放锁
    async fn unlock(&self, key: &str) -> Result<()>;

    /// 续期锁的TTL
    async fn refresh(&self, key: &str, ttl: Duration) -> Result<()>;
}
