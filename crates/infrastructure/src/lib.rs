pub mod database;
pub mod manager;
pub mod memory_locker;
pub mod memory_queue;
pub mod redis_locker;
pub mod redis_queue;

pub use database::postgres::PostgresQueue;
pub use database::sqlite::SqliteQueue;
pub use manager::QueueManager;
pub use memory_locker::MemoryLocker;
pub use memory_queue::MemoryQueue;
pub use redis_locker::RedisLocker;
pub use redis_queue::RedisQueue;
