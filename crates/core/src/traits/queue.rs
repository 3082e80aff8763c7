use std::time::Duration;

use async_trait::async_trait;

use crate::errors::Result;
use crate::models::{Job, JobOptions};

/// 队列后端抽象接口
///
/// 所有实现必须保证：作业仅在 `reserved_at` 为空且 `available_at <= now`
/// 时对 `pop` 可见；同一作业同一时刻至多被一个调用方认领，排他性由
/// 后端存储的原子操作保证，而不是由调用方保证。
#[async_trait]
pub trait Queue: Send + Sync {
    /// 推送作业到队列，返回后端分配的作业ID。
    /// `delay` 大于零的作业先进入延迟结构，到期后才可见。
    async fn push(&self, job: Job) -> Result<String>;

    /// 以原始载荷推送作业
    async fn push_raw(
        &self,
        queue: &str,
        job_type: &str,
        payload: serde_json::Value,
        options: JobOptions,
    ) -> Result<String>;

    /// 延迟推送作业
    async fn later(&self, job: Job, delay: Duration) -> Result<String>;

    /// 从队列中取出一个作业并认领。
    /// 无可见作业时返回 `WorkqError::QueueEmpty`。
    async fn pop(&self, queue: &str) -> Result<Job>;

    /// 获取队列中待处理（未认领）的作业数量
    async fn size(&self, queue: &str) -> Result<i64>;

    /// 删除作业。作业可能仍存在于就绪或延迟结构中，两处都要清理。
    async fn delete(&self, queue: &str, job: &Job) -> Result<()>;

    /// 释放作业回队列：递增尝试次数；次数耗尽时改为删除；
    /// 否则按"显式延迟 > 退避表 > 固定间隔"计算下次可见时间并重新入队。
    async fn release(&self, queue: &str, job: &mut Job, delay: Option<Duration>) -> Result<()>;

    /// 清空队列
    async fn clear(&self, queue: &str) -> Result<()>;
}
