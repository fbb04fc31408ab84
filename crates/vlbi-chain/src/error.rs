use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChainError {
    #[error("chain is already running")]
    AlreadyRunning,
    #[error("chain is not running")]
    NotRunning,
    #[error("unknown step id {0}")]
    UnknownStep(u32),
    #[error("a worker thread panicked in step {step} ({name})")]
    WorkerPanicked { step: u32, name: &'static str },
}
