use async_trait::async_trait;

use crate::errors::Result;
use crate::models::Job;

/// 作业处理器
///
/// 按 `Job::job_type` 标签注册到工作进程的处理器表。处理失败返回
/// 错误即可，重试与退避由工作进程负责。
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// 处理器负责的作业类型标签
    fn name(&self) -> &str;

    /// 处理作业
    async fn handle(&self, job: &Job) -> Result<()>;
}
