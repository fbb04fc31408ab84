use thiserror::Error;

use crate::mode::TransferMode;

#[derive(Error, Debug)]
pub enum ModeError {
    #[error("busy with {current}")]
    Busy { current: TransferMode },
    #[error("runtime is idle, nothing to close")]
    AlreadyIdle,
    #[error("chain build failed: {0}")]
    ChainBuildFailed(String),
}

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("unknown command verb {0:?}")]
    UnknownVerb(String),
    #[error("wrong number of arguments for {verb:?}: expected {expected}, got {got}")]
    ArgCount { verb: String, expected: usize, got: usize },
    #[error("mode transition rejected: {0}")]
    Mode(#[from] ModeError),
}
