//! Error types for mapfetch.
//!
//! These are the errors returned synchronously to the caller. Failures of an
//! issued request never surface here; they are classified and delivered
//! through the request's responder.

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("malformed URL {url}: {reason}")]
    MalformedUrl { url: String, reason: String },

    #[error("invalid value for header {name}")]
    InvalidHeader { name: &'static str },

    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] io::Error),

    #[error("failed to start worker pool: {0}")]
    Runtime(#[source] io::Error),

    #[error("failed to initialize HTTP transport: {0}")]
    TransportInit(String),

    #[error("fetcher has been shut down")]
    ShutDown,
}

impl Error {
    pub(crate) fn malformed(url: &str, reason: impl ToString) -> Self {
        Error::MalformedUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Cause of a failed transfer, as far as the transport can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    NoRouteToHost,
    UnknownHost,
    /// Refused, reset or otherwise broken socket.
    Socket,
    /// The peer violated HTTP (bad framing, redirect loop, ...).
    Protocol,
    Tls,
    /// The operation was cut short, typically by a timeout.
    Interrupted,
    Other,
}

/// Error raised by an [`HttpTransport`](crate::HttpTransport) before or
/// while reading a response.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn unknown_host(host: &str) -> Self {
        Self::new(
            TransportErrorKind::UnknownHost,
            format!("Unable to resolve host \"{host}\": No address associated with hostname"),
        )
    }

    pub fn interrupted(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Interrupted, message)
    }
}

impl From<io::ErrorKind> for TransportErrorKind {
    fn from(kind: io::ErrorKind) -> Self {
        match kind {
            io::ErrorKind::TimedOut | io::ErrorKind::Interrupted | io::ErrorKind::WouldBlock => {
                TransportErrorKind::Interrupted
            }
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::AddrInUse
            | io::ErrorKind::AddrNotAvailable => TransportErrorKind::Socket,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                TransportErrorKind::NoRouteToHost
            }
            io::ErrorKind::InvalidData => TransportErrorKind::Protocol,
            _ => TransportErrorKind::Other,
        }
    }
}

impl From<io::Error> for TransportError {
    fn from(e: io::Error) -> Self {
        TransportError::new(e.kind().into(), e.to_string())
    }
}
