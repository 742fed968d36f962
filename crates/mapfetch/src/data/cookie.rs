//! Session cookies and `Set-Cookie` parsing.

use std::time::{Duration, SystemTime};

use url::Url;

/// A cookie received from a server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// Lower-cased domain, without a leading dot.
    pub domain: String,
    pub path: String,
    /// Set when the server sent no `Domain` attribute: only the exact host matches.
    pub host_only: bool,
    pub secure: bool,
    pub http_only: bool,
    /// `None` for session cookies.
    pub expires: Option<SystemTime>,
}

impl Cookie {
    /// Create a host-only session cookie valid for every path on `domain`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: normalize_domain(&domain.into()),
            path: "/".to_string(),
            host_only: true,
            secure: false,
            http_only: false,
            expires: None,
        }
    }

    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Let subdomains of the cookie's domain match too.
    #[must_use]
    pub fn include_subdomains(mut self) -> Self {
        self.host_only = false;
        self
    }

    #[must_use]
    pub fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    #[must_use]
    pub fn expires_at(mut self, at: SystemTime) -> Self {
        self.expires = Some(at);
        self
    }

    pub fn is_expired(&self) -> bool {
        self.expires.is_some_and(|at| at <= SystemTime::now())
    }

    pub fn matches_domain(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        if host == self.domain {
            return true;
        }
        !self.host_only
            && host.len() > self.domain.len()
            && host.ends_with(&self.domain)
            && host.as_bytes()[host.len() - self.domain.len() - 1] == b'.'
    }

    pub fn matches_path(&self, path: &str) -> bool {
        if path == self.path {
            return true;
        }
        path.starts_with(&self.path)
            && (self.path.ends_with('/') || path[self.path.len()..].starts_with('/'))
    }

    /// Whether this cookie should be sent with a request to `url`.
    pub fn matches(&self, url: &Url) -> bool {
        let Some(host) = url.host_str() else {
            return false;
        };
        if self.secure && url.scheme() != "https" {
            return false;
        }
        !self.is_expired() && self.matches_domain(host) && self.matches_path(url.path())
    }

    /// `name=value` pair for the `Cookie` request header.
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }

    /// Parse one `Set-Cookie` header received from `url`.
    ///
    /// Returns `None` for malformed headers and for cookies whose `Domain`
    /// attribute does not cover the responding host.
    pub fn parse(header: &str, url: &Url) -> Option<Cookie> {
        let host = url.host_str()?.to_ascii_lowercase();
        let mut parts = header.split(';');

        let (name, value) = parts.next()?.split_once('=')?;
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut cookie = Cookie {
            name: name.to_string(),
            value: value.trim().trim_matches('"').to_string(),
            domain: host.clone(),
            path: default_path(url.path()),
            host_only: true,
            secure: false,
            http_only: false,
            expires: None,
        };

        for attr in parts {
            let (key, val) = match attr.split_once('=') {
                Some((k, v)) => (k.trim(), v.trim()),
                None => (attr.trim(), ""),
            };
            match key.to_ascii_lowercase().as_str() {
                "domain" if !val.is_empty() => {
                    cookie.domain = normalize_domain(val);
                    cookie.host_only = false;
                }
                "path" if val.starts_with('/') => cookie.path = val.to_string(),
                "secure" => cookie.secure = true,
                "httponly" => cookie.http_only = true,
                "max-age" => {
                    if let Ok(seconds) = val.parse::<i64>() {
                        // Out of range lifetimes degrade to a session cookie.
                        cookie.expires = if seconds <= 0 {
                            Some(SystemTime::UNIX_EPOCH)
                        } else {
                            SystemTime::now().checked_add(Duration::from_secs(seconds as u64))
                        };
                    }
                }
                _ => {}
            }
        }

        if !cookie.host_only && !cookie.matches_domain(&host) {
            return None;
        }
        Some(cookie)
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_start_matches('.').to_ascii_lowercase()
}

/// RFC 6265 default-path: the request path up to, not including, its last `/`.
fn default_path(path: &str) -> String {
    match path.rfind('/') {
        Some(0) | None => "/".to_string(),
        Some(i) => path[..i].to_string(),
    }
}
