//! Platform identity for the mapfetch resource loader.
//!
//! Answers three questions the fetch core asks once per process: which OS
//! (and version) are we on, what is the primary ABI, and is this a platform
//! whose TLS stack tolerates the full per-host concurrency.

pub use error::{Error, Result};
pub use tier::{Platform, PlatformTier};

pub mod arch;
mod error;
pub mod os;
mod tier;
