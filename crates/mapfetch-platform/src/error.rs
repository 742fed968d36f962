use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("unknown architecture: {0}")]
    UnknownArch(String),

    #[error("unknown ABI: {0}")]
    UnknownAbi(String),

    #[error("unknown operating system: {0}")]
    UnknownOs(String),

    #[error("invalid OS version: {0}")]
    InvalidVersion(String),
}
