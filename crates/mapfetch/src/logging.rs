//! Tracing setup and the request logger.

use std::sync::Once;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::data::{FailureKind, FetchConfig};

static INIT_TRACING: Once = Once::new();

/// Install a `fmt` subscriber filtered by `RUST_LOG`, falling back to
/// `info,hyper=warn,reqwest=warn`. Only the first call has an effect, and
/// an already installed global subscriber is left alone.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("info,hyper=warn,reqwest=warn"));

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .try_init();

        debug!("mapfetch tracing initialized");
    });
}

/// Runtime switches for request logging, shared by a fetcher and its
/// dispatchers.
#[derive(Debug)]
pub struct HttpLogger {
    enabled: AtomicBool,
    log_request_url: AtomicBool,
}

impl Default for HttpLogger {
    fn default() -> Self {
        Self::new(true, true)
    }
}

impl HttpLogger {
    pub fn new(enabled: bool, log_request_url: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            log_request_url: AtomicBool::new(log_request_url),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.log_enabled, config.log_request_url_on_failure)
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_log_request_url(&self, enabled: bool) {
        self.log_request_url.store(enabled, Ordering::Relaxed);
    }

    pub fn logs_request_url(&self) -> bool {
        self.log_request_url.load(Ordering::Relaxed)
    }

    pub fn log_response(&self, status: u16, reason: Option<&str>) {
        if !self.is_enabled() {
            return;
        }
        if (200..300).contains(&status) {
            debug!("Request was successful (code = {status})");
        } else {
            let reason = reason.filter(|r| !r.is_empty()).unwrap_or("No additional information");
            debug!("Request with response = {status}: {reason}");
        }
    }

    /// Failure line as logged, or `None` when logging is off.
    pub fn failure_message(&self, kind: FailureKind, message: &str, url: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let url = if self.logs_request_url() { url } else { "" };
        Some(format!(
            "Request failed due to a {} error: {message} {url}",
            kind.describe()
        ))
    }

    pub fn log_failure(&self, kind: FailureKind, message: &str, url: &str) {
        let Some(line) = self.failure_message(kind, message, url) else {
            return;
        };
        match kind {
            FailureKind::Temporary => debug!("{line}"),
            FailureKind::Connection => info!("{line}"),
            FailureKind::Permanent => warn!("{line}"),
        }
    }

    pub fn log_cancelled(&self, url: &str) {
        if self.is_enabled() {
            debug!("Request was cancelled. This is expected for tiles that are no longer needed: {url}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_line_includes_url_when_asked() {
        let logger = HttpLogger::default();
        assert_eq!(
            logger
                .failure_message(FailureKind::Connection, "Unable to resolve host", "https://t.example/1.pbf")
                .as_deref(),
            Some("Request failed due to a connection error: Unable to resolve host https://t.example/1.pbf")
        );

        logger.set_log_request_url(false);
        assert_eq!(
            logger
                .failure_message(FailureKind::Temporary, "timeout", "https://t.example/1.pbf")
                .as_deref(),
            Some("Request failed due to a temporary error: timeout ")
        );
    }

    #[test]
    fn disabled_logger_is_silent() {
        let logger = HttpLogger::new(false, true);
        assert!(logger.failure_message(FailureKind::Permanent, "boom", "u").is_none());
        logger.set_enabled(true);
        assert!(logger.is_enabled());
        assert!(logger.failure_message(FailureKind::Permanent, "boom", "u").is_some());
    }

    #[test]
    fn init_tracing_is_idempotent() {
        init_tracing();
        init_tracing();
    }
}
