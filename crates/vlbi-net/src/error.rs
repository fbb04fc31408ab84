use thiserror::Error;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("unknown net-protocol token {0:?}")]
    UnknownProtocol(String),
    #[error("net-protocol {0:?} is recognized but has no shipped connector")]
    NotImplemented(&'static str),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
