//! Loader configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Gateway used to establish session cookies before tile traffic starts.
pub const DEFAULT_SESSION_GATEWAY: &str = "https://gateway.mapmetrics.org/20250110/1/1/3.mvt?token=";

/// Global cap on simultaneously active transfers.
pub const DEFAULT_MAX_REQUESTS: usize = 64;

/// Configuration for a [`ResourceFetcher`](crate::ResourceFetcher).
///
/// Every field has a default, so a TOML file only needs the keys it changes:
///
/// ```
/// use mapfetch::FetchConfig;
///
/// let config = FetchConfig::from_toml_str(r#"
///     product = "AtlasRenderer"
///     max_requests_per_host = 8
/// "#).unwrap();
/// assert_eq!(config.product, "AtlasRenderer");
/// assert_eq!(config.max_requests, 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Product token at the start of the `User-Agent` header.
    pub product: String,
    pub sdk_version: String,
    /// Short build revision, shown in parentheses after the version.
    pub revision: String,

    pub max_requests: usize,
    /// Per-host cap. `None` uses the platform tier default (20, or 10 on
    /// legacy platforms).
    pub max_requests_per_host: Option<usize>,
    /// Worker threads of the pool that runs transfers and callbacks.
    pub worker_threads: usize,

    pub connect_timeout_ms: u64,
    /// Overall per-request timeout, including the body read.
    pub request_timeout_ms: u64,
    pub pool_idle_per_host: usize,

    /// Base URL the session token is appended to.
    pub session_gateway: String,

    /// Query parameter appended to URLs fetched for offline use.
    /// `None` leaves offline URLs untouched.
    pub offline_parameter: Option<String>,
    /// Hosts (or parent domains) the offline parameter applies to. Empty
    /// means every host.
    pub offline_hosts: Vec<String>,

    pub log_enabled: bool,
    pub log_request_url_on_failure: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            product: "MapFetch".to_string(),
            sdk_version: env!("CARGO_PKG_VERSION").to_string(),
            revision: option_env!("MAPFETCH_GIT_REVISION").unwrap_or("unknown").to_string(),
            max_requests: DEFAULT_MAX_REQUESTS,
            max_requests_per_host: None,
            worker_threads: 4,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            pool_idle_per_host: 8,
            session_gateway: DEFAULT_SESSION_GATEWAY.to_string(),
            offline_parameter: Some("offline=true".to_string()),
            offline_hosts: Vec::new(),
            log_enabled: true,
            log_request_url_on_failure: true,
        }
    }
}

impl FetchConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        Ok(toml::from_str(s)?)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    #[must_use]
    pub fn product(mut self, product: impl Into<String>) -> Self {
        self.product = product.into();
        self
    }

    #[must_use]
    pub fn sdk_version(mut self, version: impl Into<String>, revision: impl Into<String>) -> Self {
        self.sdk_version = version.into();
        self.revision = revision.into();
        self
    }

    #[must_use]
    pub fn max_requests(mut self, max: usize) -> Self {
        self.max_requests = max;
        self
    }

    #[must_use]
    pub fn max_requests_per_host(mut self, max: usize) -> Self {
        self.max_requests_per_host = Some(max);
        self
    }

    #[must_use]
    pub fn worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    #[must_use]
    pub fn session_gateway(mut self, base: impl Into<String>) -> Self {
        self.session_gateway = base.into();
        self
    }

    #[must_use]
    pub fn offline_parameter(mut self, parameter: Option<String>) -> Self {
        self.offline_parameter = parameter;
        self
    }

    #[must_use]
    pub fn offline_host(mut self, host: impl Into<String>) -> Self {
        self.offline_hosts.push(host.into());
        self
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
