pub mod config;
pub mod errors;
pub mod logging;
pub mod models;
pub mod traits;

pub use config::{
    AppConfig, DatabaseQueueConfig, MemoryQueueConfig, QueueConfig, RedisQueueConfig,
    SchedulerConfig, SqliteQueueConfig, WorkerConfig,
};
pub use errors::{Result, WorkqError};
pub use models::{Job, JobOptions};
pub use traits::{DistributedLocker, JobHandler, Queue};
