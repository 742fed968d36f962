//! Mapping transport results onto [`ClassifiedOutcome`].

use bytes::Bytes;

use crate::data::{ClassifiedOutcome, FailureKind, FetchResponse};
use crate::error::{TransportError, TransportErrorKind};

pub const ETAG: &str = "etag";
pub const LAST_MODIFIED: &str = "last-modified";
pub const CACHE_CONTROL: &str = "cache-control";
pub const EXPIRES: &str = "expires";
pub const RETRY_AFTER: &str = "retry-after";
pub const RATE_LIMIT_RESET: &str = "x-rate-limit-reset";

/// Failure class for a transfer that produced no usable response.
pub fn classify_kind(kind: TransportErrorKind) -> FailureKind {
    match kind {
        TransportErrorKind::NoRouteToHost
        | TransportErrorKind::UnknownHost
        | TransportErrorKind::Socket
        | TransportErrorKind::Protocol
        | TransportErrorKind::Tls => FailureKind::Connection,
        TransportErrorKind::Interrupted => FailureKind::Temporary,
        TransportErrorKind::Other => FailureKind::Permanent,
    }
}

pub fn classify_error(error: &TransportError) -> ClassifiedOutcome {
    ClassifiedOutcome::failure(classify_kind(error.kind), error.message.clone())
}

fn header(headers: &[(String, String)], name: &str) -> Option<String> {
    headers
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.clone())
}

/// Collect the caching and rate-limit metadata of a received response.
///
/// Any status is accepted; deciding what a 404 or a 429 means is up to the
/// caller.
pub fn response_metadata(status: u16, headers: &[(String, String)], body: Bytes) -> FetchResponse {
    FetchResponse {
        status,
        etag: header(headers, ETAG),
        last_modified: header(headers, LAST_MODIFIED),
        cache_control: header(headers, CACHE_CONTROL),
        expires: header(headers, EXPIRES),
        retry_after: header(headers, RETRY_AFTER),
        rate_limit_reset: header(headers, RATE_LIMIT_RESET),
        body,
    }
}
