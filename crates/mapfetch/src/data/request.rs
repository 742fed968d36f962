use std::fmt;

/// Opaque token identifying the native caller of a fetch.
///
/// The value is whatever the native side uses to find its request object
/// again (usually a pointer). It is compared and hashed, never dereferenced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CallerHandle(u64);

impl CallerHandle {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for CallerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// One resource fetch as asked for by the renderer.
///
/// Optional fields are `None` when absent. The native surface passes empty
/// strings for "absent"; [`FetchRequest::from_native`] folds those to `None`.
///
/// # Examples
///
/// ```
/// use mapfetch::FetchRequest;
///
/// let request = FetchRequest::new("https://tiles.example/3/4/2.pbf")
///     .with_etag("\"v1\"")
///     .with_byte_range("bytes=0-1023");
/// assert_eq!(request.etag(), Some("\"v1\""));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchRequest {
    url: String,
    byte_range: Option<String>,
    etag: Option<String>,
    last_modified: Option<String>,
    offline_usage: bool,
}

impl FetchRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Build from the native calling convention, where every optional string
    /// is passed and "absent" is the empty string.
    pub fn from_native(
        url: &str,
        byte_range: &str,
        etag: &str,
        last_modified: &str,
        offline_usage: bool,
    ) -> Self {
        Self {
            url: url.to_string(),
            byte_range: non_empty(byte_range),
            etag: non_empty(etag),
            last_modified: non_empty(last_modified),
            offline_usage,
        }
    }

    #[must_use]
    pub fn with_byte_range(mut self, range: impl Into<String>) -> Self {
        self.byte_range = non_empty(&range.into());
        self
    }

    #[must_use]
    pub fn with_etag(mut self, etag: impl Into<String>) -> Self {
        self.etag = non_empty(&etag.into());
        self
    }

    #[must_use]
    pub fn with_last_modified(mut self, modified: impl Into<String>) -> Self {
        self.last_modified = non_empty(&modified.into());
        self
    }

    #[must_use]
    pub fn with_offline_usage(mut self, offline: bool) -> Self {
        self.offline_usage = offline;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn byte_range(&self) -> Option<&str> {
        self.byte_range.as_deref()
    }

    pub fn etag(&self) -> Option<&str> {
        self.etag.as_deref()
    }

    pub fn last_modified(&self) -> Option<&str> {
        self.last_modified.as_deref()
    }

    pub fn offline_usage(&self) -> bool {
        self.offline_usage
    }
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() { None } else { Some(s.to_string()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_empty_strings_are_absent() {
        let req = FetchRequest::from_native("http://tiles.example/1.pbf", "", "", "", false);
        assert_eq!(req.url(), "http://tiles.example/1.pbf");
        assert_eq!(req.byte_range(), None);
        assert_eq!(req.etag(), None);
        assert_eq!(req.last_modified(), None);
        assert!(!req.offline_usage());
    }

    #[test]
    fn native_values_are_kept_verbatim() {
        let req = FetchRequest::from_native(
            "http://tiles.example/1.pbf",
            "bytes=0-99",
            "\"abc\"",
            "Wed, 21 Oct 2015 07:28:00 GMT",
            true,
        );
        assert_eq!(req.byte_range(), Some("bytes=0-99"));
        assert_eq!(req.etag(), Some("\"abc\""));
        assert_eq!(req.last_modified(), Some("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert!(req.offline_usage());
    }

    #[test]
    fn caller_handle_displays_as_hex() {
        assert_eq!(CallerHandle::new(255).to_string(), "0xff");
        assert_eq!(CallerHandle::new(7).raw(), 7);
    }
}
