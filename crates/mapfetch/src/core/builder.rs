//! Turns a [`FetchRequest`] into the request that goes on the wire.

use mapfetch_platform::Platform;
use url::Url;

use crate::core::identity::UserAgent;
use crate::core::resource_url::{UrlPolicy, normalize_host, parse_resource_url};
use crate::data::{FetchConfig, FetchRequest};
use crate::error::{Error, Result};

pub const USER_AGENT: &str = "User-Agent";
pub const RANGE: &str = "Range";
pub const IF_NONE_MATCH: &str = "If-None-Match";
pub const IF_MODIFIED_SINCE: &str = "If-Modified-Since";

/// A fully built GET request. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRequest {
    url: Url,
    host: String,
    headers: Vec<(&'static str, String)>,
}

impl OutboundRequest {
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Lower-cased host, the key for per-host limits.
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn headers(&self) -> &[(&'static str, String)] {
        &self.headers
    }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds outbound requests: URL normalization and rewriting, the
/// identifying header, range and conditional headers.
#[derive(Debug, Clone)]
pub struct RequestBuilder {
    user_agent: UserAgent,
    urls: UrlPolicy,
}

impl RequestBuilder {
    pub fn new(user_agent: UserAgent, urls: UrlPolicy) -> Self {
        Self { user_agent, urls }
    }

    pub fn from_config(config: &FetchConfig, platform: &Platform) -> Self {
        Self::new(UserAgent::from_config(config, platform), UrlPolicy::from_config(config))
    }

    pub fn user_agent(&self) -> &UserAgent {
        &self.user_agent
    }

    /// Build the request for a resource fetch.
    ///
    /// # Errors
    ///
    /// [`Error::MalformedUrl`] when the URL does not parse or is not
    /// http(s); [`Error::InvalidHeader`] when a range or validator value
    /// cannot be sent as a header.
    pub fn build(&self, request: &FetchRequest) -> Result<OutboundRequest> {
        let parsed = parse_resource_url(request.url())?;
        let host = normalize_host(parsed.host_str().unwrap_or_default());
        let query_size = parsed.query_pairs().count();
        let url = self
            .urls
            .build_resource_url(&host, &parsed, query_size, request.offline_usage());

        let mut headers = vec![(USER_AGENT, self.user_agent.as_str().to_string())];

        if let Some(range) = request.byte_range() {
            headers.push((RANGE, checked(RANGE, range)?));
        }

        if let Some(etag) = request.etag() {
            headers.push((IF_NONE_MATCH, checked(IF_NONE_MATCH, etag)?));
        } else if let Some(modified) = request.last_modified() {
            headers.push((IF_MODIFIED_SINCE, checked(IF_MODIFIED_SINCE, modified)?));
        }

        Ok(OutboundRequest { url, host, headers })
    }

    /// Build a plain GET carrying only the identifying header.
    pub fn build_plain(&self, url: &str) -> Result<OutboundRequest> {
        let url = parse_resource_url(url)?;
        let host = normalize_host(url.host_str().unwrap_or_default());
        Ok(OutboundRequest {
            url,
            host,
            headers: vec![(USER_AGENT, self.user_agent.as_str().to_string())],
        })
    }
}

fn checked(name: &'static str, value: &str) -> Result<String> {
    if value.bytes().all(|b| b == b'\t' || (0x20..0x7f).contains(&b) || b >= 0x80) {
        Ok(value.to_string())
    } else {
        Err(Error::InvalidHeader { name })
    }
}
