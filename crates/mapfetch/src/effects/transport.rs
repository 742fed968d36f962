//! HTTP transport abstraction.
//!
//! The dispatcher talks to the network only through [`HttpTransport`]. The
//! default implementation is backed by `reqwest`; tests install scripted
//! transports instead.

use std::fmt;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{self, BoxStream};

use crate::core::OutboundRequest;
use crate::error::TransportError;

pub type BodyStream = BoxStream<'static, Result<Bytes, TransportError>>;

/// A response as received from the transport, body still unread.
pub struct TransportResponse {
    pub status: u16,
    /// Reason phrase, when the transport knows one.
    pub reason: Option<String>,
    pub headers: Vec<(String, String)>,
    /// `None` when the transport produced no body at all. An empty body is
    /// `Some` of an empty stream.
    pub body: Option<BodyStream>,
}

impl TransportResponse {
    /// Response with the given status and an empty body.
    pub fn new(status: u16) -> Self {
        Self {
            status,
            reason: None,
            headers: Vec::new(),
            body: Some(Box::pin(stream::empty())),
        }
    }

    #[must_use]
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(Box::pin(stream::once(futures_util::future::ready(Ok(body.into())))));
        self
    }

    #[must_use]
    pub fn with_stream(mut self, body: BodyStream) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn without_body(mut self) -> Self {
        self.body = None;
        self
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("reason", &self.reason)
            .field("headers", &self.headers)
            .field("body", &self.body.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Executes a single GET.
///
/// Implementations must be usable from many tasks at once. Cookies are the
/// transport's concern: a transport that supports them is expected to
/// consult and feed the fetcher's [`CookieStore`](crate::CookieStore).
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send `request` and return once the status line and headers arrived.
    ///
    /// # Errors
    ///
    /// A [`TransportError`] when no response was received.
    async fn execute(&self, request: &OutboundRequest) -> Result<TransportResponse, TransportError>;
}

#[cfg(feature = "reqwest")]
mod reqwest_impl {
    use std::error::Error as _;
    use std::io;
    use std::sync::Arc;

    use futures_util::StreamExt;
    use tracing::debug;

    use super::*;
    use crate::data::FetchConfig;
    use crate::effects::CookieStore;
    use crate::error::{Error, Result, TransportErrorKind};

    /// Production transport: a pooled `reqwest` client wired to the
    /// fetcher's cookie store.
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new(config: &FetchConfig, cookies: Arc<CookieStore>) -> Result<Self> {
            let client = reqwest::Client::builder()
                .cookie_provider(cookies)
                .connect_timeout(config.connect_timeout())
                .timeout(config.request_timeout())
                .pool_max_idle_per_host(config.pool_idle_per_host)
                .build()
                .map_err(|e| Error::TransportInit(e.to_string()))?;
            debug!("created reqwest transport");
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn execute(
            &self,
            request: &OutboundRequest,
        ) -> std::result::Result<TransportResponse, TransportError> {
            let mut builder = self.client.get(request.url().clone());
            for (name, value) in request.headers() {
                builder = builder.header(*name, value.as_str());
            }

            let response = builder.send().await?;
            let status = response.status();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(name, value)| {
                    value
                        .to_str()
                        .ok()
                        .map(|v| (name.as_str().to_string(), v.to_string()))
                })
                .collect();
            let body = response.bytes_stream().map(|chunk| chunk.map_err(TransportError::from));

            Ok(TransportResponse {
                status: status.as_u16(),
                reason: status.canonical_reason().map(str::to_string),
                headers,
                body: Some(Box::pin(body)),
            })
        }
    }

    fn io_kind(e: &reqwest::Error) -> Option<io::ErrorKind> {
        let mut source = e.source();
        while let Some(err) = source {
            if let Some(io) = err.downcast_ref::<io::Error>() {
                return Some(io.kind());
            }
            source = err.source();
        }
        None
    }

    fn describe(e: &reqwest::Error) -> String {
        let mut message = e.to_string();
        let mut source = e.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }

    impl From<reqwest::Error> for TransportError {
        fn from(e: reqwest::Error) -> Self {
            let message = describe(&e);
            let lowered = message.to_ascii_lowercase();

            let kind = if e.is_timeout() {
                TransportErrorKind::Interrupted
            } else if lowered.contains("dns error") || lowered.contains("failed to lookup address") {
                TransportErrorKind::UnknownHost
            } else if let Some(kind) = io_kind(&e)
                .map(TransportErrorKind::from)
                .filter(|k| *k != TransportErrorKind::Other)
            {
                kind
            } else if ["certificate", "tls", "ssl", "handshake"]
                .iter()
                .any(|needle| lowered.contains(needle))
            {
                TransportErrorKind::Tls
            } else if e.is_connect() {
                TransportErrorKind::Socket
            } else if e.is_redirect() || e.is_request() || e.is_body() || e.is_decode() {
                TransportErrorKind::Protocol
            } else {
                TransportErrorKind::Other
            };

            TransportError::new(kind, message)
        }
    }
}

#[cfg(feature = "reqwest")]
pub use reqwest_impl::ReqwestTransport;

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn default_response_has_empty_body() {
        let response = TransportResponse::new(204);
        let chunks: Vec<_> = response.body.unwrap().collect().await;
        assert!(chunks.is_empty());
    }

    #[tokio::test]
    async fn with_body_yields_one_chunk() {
        let response = TransportResponse::new(200).with_body("abc");
        let chunks: Vec<_> = response.body.unwrap().collect().await;
        assert_eq!(chunks, vec![Ok(Bytes::from_static(b"abc"))]);
    }

    #[test]
    fn without_body_is_distinct_from_empty() {
        let response = TransportResponse::new(200).with_header("ETag", "\"a\"").without_body();
        assert!(response.body.is_none());
        assert!(format!("{response:?}").contains("ETag"));
    }
}
