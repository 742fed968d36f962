use std::fmt;

use bytes::Bytes;

/// Failure classes reported to the caller.
///
/// The caller owns retry policy: [`FailureKind::Connection`] and
/// [`FailureKind::Temporary`] are expected to be retried with backoff,
/// [`FailureKind::Permanent`] is not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Host unreachable, unknown host, socket, protocol or TLS failure.
    Connection,
    /// The transfer was interrupted, e.g. by a timeout.
    Temporary,
    /// Anything else.
    Permanent,
}

impl FailureKind {
    /// Numeric code used on the native side of the boundary.
    pub const fn code(&self) -> i32 {
        match self {
            FailureKind::Connection => 0,
            FailureKind::Temporary => 1,
            FailureKind::Permanent => 2,
        }
    }

    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(FailureKind::Connection),
            1 => Some(FailureKind::Temporary),
            2 => Some(FailureKind::Permanent),
            _ => None,
        }
    }

    pub const fn is_retryable(&self) -> bool {
        !matches!(self, FailureKind::Permanent)
    }

    pub(crate) fn describe(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Temporary => "temporary",
            FailureKind::Permanent => "permanent",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.describe())
    }
}

/// A received HTTP response, whatever its status.
///
/// Header fields carry the raw header value when the server sent one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchResponse {
    pub status: u16,
    pub etag: Option<String>,
    pub last_modified: Option<String>,
    pub cache_control: Option<String>,
    pub expires: Option<String>,
    pub retry_after: Option<String>,
    pub rate_limit_reset: Option<String>,
    pub body: Bytes,
}

impl FetchResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_not_modified(&self) -> bool {
        self.status == 304
    }
}

/// The single terminal result of a completed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassifiedOutcome {
    Success(FetchResponse),
    Failure { kind: FailureKind, message: String },
}

impl ClassifiedOutcome {
    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        ClassifiedOutcome::Failure {
            kind,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ClassifiedOutcome::Success(_))
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            ClassifiedOutcome::Failure { kind, .. } => Some(*kind),
            ClassifiedOutcome::Success(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_codes_match_native_constants() {
        assert_eq!(FailureKind::Connection.code(), 0);
        assert_eq!(FailureKind::Temporary.code(), 1);
        assert_eq!(FailureKind::Permanent.code(), 2);
        assert_eq!(FailureKind::from_code(1), Some(FailureKind::Temporary));
        assert_eq!(FailureKind::from_code(3), None);
    }

    #[test]
    fn only_permanent_failures_are_final() {
        assert!(FailureKind::Connection.is_retryable());
        assert!(FailureKind::Temporary.is_retryable());
        assert!(!FailureKind::Permanent.is_retryable());
    }

    #[test]
    fn not_modified_is_not_a_failure() {
        let response = FetchResponse {
            status: 304,
            ..Default::default()
        };
        assert!(response.is_not_modified());
        assert!(!response.is_success());
        assert!(ClassifiedOutcome::Success(response).is_success());
    }
}
