use serde::{Deserialize, Serialize};

use crate::errors::{Result, WorkqError};

/// 应用配置
///
/// 从 TOML 文件加载，环境变量（`WORKQ__` 前缀，`__` 分隔）可覆盖，
/// 加载后立即校验。
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub queue: QueueConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    /// 加载配置文件。`path` 为空时只使用默认值和环境变量。
    pub fn load(path: Option<&str>) -> Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(config::Environment::with_prefix("WORKQ").separator("__"))
            .build()
            .map_err(|e| WorkqError::Configuration(e.to_string()))?;

        let config: AppConfig = settings
            .try_deserialize()
            .map_err(|e| WorkqError::Configuration(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.queue.validate()?;
        self.worker.validate()?;
        self.scheduler.validate()?;
        Ok(())
    }
}

/// 队列后端配置
///
/// 每种驱动一个带类型的变体，取代动态 options 表；非法组合在
/// 反序列化和校验阶段就会被拒绝。
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "driver", rename_all = "lowercase")]
pub enum QueueConfig {
    /// Redis 驱动：就绪列表 + 延迟有序集合 + 作业哈希
    Redis(RedisQueueConfig),
    /// 关系库驱动（PostgreSQL）
    #[serde(rename = "database", alias = "postgres", alias = "mysql")]
    Database(DatabaseQueueConfig),
    /// 嵌入式 SQLite 驱动
    Sqlite(SqliteQueueConfig),
    /// 进程内内存驱动，用于嵌入式部署和测试
    Memory(MemoryQueueConfig),
}

impl Default for QueueConfig {
    fn default() -> Self {
        QueueConfig::Memory(MemoryQueueConfig::default())
    }
}

impl QueueConfig {
    pub fn driver_name(&self) -> &'static str {
        match self {
            QueueConfig::Redis(_) => "redis",
            QueueConfig::Database(_) => "database",
            QueueConfig::Sqlite(_) => "sqlite",
            QueueConfig::Memory(_) => "memory",
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            QueueConfig::Redis(c) => {
                if !c.url.starts_with("redis://") && !c.url.starts_with("rediss://") {
                    return Err(WorkqError::Configuration(format!(
                        "redis url 必须以 redis:// 或 rediss:// 开头: {}",
                        c.url
                    )));
                }
                if c.default_queue.is_empty() {
                    return Err(WorkqError::Configuration(
                        "default_queue 不能为空".to_string(),
                    ));
                }
                Ok(())
            }
            QueueConfig::Database(c) => {
                if c.url.is_empty() {
                    return Err(WorkqError::Configuration("database url 不能为空".to_string()));
                }
                if c.default_queue.is_empty() {
                    return Err(WorkqError::Configuration(
                        "default_queue 不能为空".to_string(),
                    ));
                }
                Ok(())
            }
            QueueConfig::Sqlite(c) => {
                if c.path.is_empty() {
                    return Err(WorkqError::Configuration("sqlite path 不能为空".to_string()));
                }
                Ok(())
            }
            QueueConfig::Memory(_) => Ok(()),
        }
    }
}

fn default_queue_name() -> String {
    "default".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisQueueConfig {
    pub url: String,
    #[serde(default = "default_queue_name")]
    pub default_queue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseQueueConfig {
    pub url: String,
    #[serde(default = "default_queue_name")]
    pub default_queue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteQueueConfig {
    pub path: String,
    #[serde(default = "default_queue_name")]
    pub default_queue: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryQueueConfig {
    #[serde(default = "default_queue_name")]
    pub default_queue: String,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            default_queue: default_queue_name(),
        }
    }
}

/// 工作进程配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// 监听的队列列表，按顺序扫描
    pub queues: Vec<String>,
    /// 并行的工作进程实例数
    pub concurrency: usize,
    /// 所有队列为空时的休眠时间（秒）
    pub sleep_seconds: u64,
    /// 处理的最大作业数，0 表示不限
    pub max_jobs: u64,
    /// 最长运行时间（秒），0 表示不限
    pub max_time_seconds: u64,
    /// 每个作业之间的间歇（毫秒），用于限流
    pub rest_ms: u64,
    /// 常驻内存上限（MB），0 表示不限
    pub memory_limit_mb: u64,
    /// 作业默认最大尝试次数（可被作业自身策略覆盖）
    pub tries: u32,
    /// 作业默认执行超时（秒，可被作业自身策略覆盖）
    pub timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            queues: vec!["default".to_string()],
            concurrency: 1,
            sleep_seconds: 3,
            max_jobs: 0,
            max_time_seconds: 0,
            rest_ms: 0,
            memory_limit_mb: 128,
            tries: 3,
            timeout_seconds: 60,
        }
    }
}

impl WorkerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.queues.is_empty() {
            return Err(WorkqError::Configuration(
                "worker.queues 不能为空".to_string(),
            ));
        }
        if self.concurrency == 0 {
            return Err(WorkqError::Configuration(
                "worker.concurrency 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// 调度器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// 唯一任务锁的TTL（秒），应大于任务的预期执行时长
    pub lock_ttl_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            lock_ttl_seconds: 1800,
        }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.lock_ttl_seconds == 0 {
            return Err(WorkqError::Configuration(
                "scheduler.lock_ttl_seconds 必须大于 0".to_string(),
            ));
        }
        Ok(())
    }
}
