use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use workq_core::traits::JobHandler;

/// 作业处理器注册表
///
/// 按作业类型标签查找处理器。注册在启动阶段完成，运行期只读。
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn JobHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册处理器，同名后注册者覆盖先注册者
    pub fn register(&mut self, handler: Arc<dyn JobHandler>) {
        let name = handler.name().to_string();
        info!("注册作业处理器: {name}");
        self.handlers.insert(name, handler);
    }

    pub fn get(&self, job_type: &str) -> Option<Arc<dyn JobHandler>> {
        self.handlers.get(job_type).cloned()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}
