//! Resource URL parsing and the offline/online URL variants.

use url::Url;

use crate::data::FetchConfig;
use crate::error::{Error, Result};

/// Parse an absolute http(s) resource URL.
pub fn parse_resource_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::malformed(raw, e))?;
    match url.scheme() {
        "http" | "https" => {}
        other => return Err(Error::malformed(raw, format!("unsupported scheme {other}"))),
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::malformed(raw, "missing host"));
    }
    Ok(url)
}

/// Lower-case a host independently of any locale.
pub fn normalize_host(host: &str) -> String {
    host.to_ascii_lowercase()
}

/// Decides how a resource URL is rewritten before it goes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UrlPolicy {
    offline_parameter: Option<String>,
    offline_hosts: Vec<String>,
}

impl UrlPolicy {
    pub fn new(offline_parameter: Option<String>, offline_hosts: Vec<String>) -> Self {
        Self {
            offline_parameter,
            offline_hosts: offline_hosts.iter().map(|h| normalize_host(h)).collect(),
        }
    }

    pub fn from_config(config: &FetchConfig) -> Self {
        Self::new(config.offline_parameter.clone(), config.offline_hosts.clone())
    }

    fn applies_to(&self, host: &str) -> bool {
        self.offline_hosts.is_empty()
            || self.offline_hosts.iter().any(|h| {
                host == h || (host.ends_with(h.as_str()) && host[..host.len() - h.len()].ends_with('.'))
            })
    }

    /// Produce the URL to request for `url`, given its already normalized
    /// host and its number of query parameters.
    pub fn build_resource_url(&self, host: &str, url: &Url, query_size: usize, offline: bool) -> Url {
        let Some(parameter) = self.offline_parameter.as_deref().filter(|_| offline) else {
            return url.clone();
        };
        if !self.applies_to(host) {
            return url.clone();
        }

        let mut rewritten = String::from(url.as_str());
        if let Some(fragment) = url.fragment() {
            rewritten.truncate(rewritten.len() - fragment.len() - 1);
        }
        if query_size == 0 {
            if url.query().is_none() {
                rewritten.push('?');
            }
        } else {
            rewritten.push('&');
        }
        rewritten.push_str(parameter);
        Url::parse(&rewritten).unwrap_or_else(|_| url.clone())
    }
}
