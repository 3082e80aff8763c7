pub mod pool;
pub mod registry;
pub mod worker;

pub use pool::WorkerPool;
pub use registry::HandlerRegistry;
pub use worker::{Worker, WorkerOptions};
