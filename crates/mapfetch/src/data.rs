//! Data layer: immutable request, outcome, cookie and configuration types.

pub mod config;
pub mod cookie;
pub mod outcome;
pub mod request;

pub use config::FetchConfig;
pub use cookie::Cookie;
pub use outcome::{ClassifiedOutcome, FailureKind, FetchResponse};
pub use request::{CallerHandle, FetchRequest};
