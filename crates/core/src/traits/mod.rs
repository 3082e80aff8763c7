pub mod handler;
pub mod locker;
pub mod queue;

pub use handler::JobHandler;
pub use locker::DistributedLocker;
pub use queue::Queue;
