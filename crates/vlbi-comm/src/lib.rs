mod error;
pub mod queue;
pub mod timer;

pub use error::QueueError;
pub use queue::{BoundedQueue, InQ, OutQ, QueueState, channel};
pub use timer::{Timer, TimingMessage};
