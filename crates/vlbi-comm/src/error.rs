use thiserror::Error;

#[derive(Error, Debug, Copy, Clone, PartialEq, Eq)]
pub enum QueueError {
    #[error("queue disabled")]
    Disabled,
    #[error("queue is pop-only and empty")]
    Drained,
}
