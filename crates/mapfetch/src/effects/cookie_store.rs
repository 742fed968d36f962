//! In-memory session cookie jar shared by every request of a fetcher.

use parking_lot::RwLock;
use tracing::trace;
use url::Url;

use crate::data::Cookie;

/// Thread-safe, append-only cookie store.
///
/// Cookies accumulate for the lifetime of the store. Expired cookies are
/// skipped when loading but only [`CookieStore::clear`] removes anything.
#[derive(Debug, Default)]
pub struct CookieStore {
    cookies: RwLock<Vec<Cookie>>,
}

impl CookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append cookies received from `url`.
    pub fn save(&self, url: &Url, cookies: impl IntoIterator<Item = Cookie>) {
        let mut stored = self.cookies.write();
        let before = stored.len();
        stored.extend(cookies);
        trace!(url = %url, added = stored.len() - before, "saved cookies");
    }

    /// Cookies that apply to a request for `url`, oldest first.
    pub fn load(&self, url: &Url) -> Vec<Cookie> {
        self.cookies
            .read()
            .iter()
            .filter(|cookie| cookie.matches(url))
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Cookie> {
        self.cookies.read().clone()
    }

    pub fn clear(&self) {
        self.cookies.write().clear();
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }

    /// Value of the `Cookie` request header for `url`.
    ///
    /// When the jar holds several cookies with the same name, domain and
    /// path, only the most recently saved one is sent.
    pub fn header_for(&self, url: &Url) -> Option<String> {
        let matching = self.load(url);
        let mut latest: Vec<&Cookie> = Vec::with_capacity(matching.len());
        for cookie in matching.iter().rev() {
            let shadowed = latest.iter().any(|seen| {
                seen.name == cookie.name && seen.domain == cookie.domain && seen.path == cookie.path
            });
            if !shadowed {
                latest.push(cookie);
            }
        }
        if latest.is_empty() {
            return None;
        }
        latest.reverse();
        Some(latest.iter().map(|c| c.pair()).collect::<Vec<_>>().join("; "))
    }
}

#[cfg(feature = "reqwest")]
impl reqwest::cookie::CookieStore for CookieStore {
    fn set_cookies(&self, cookie_headers: &mut dyn Iterator<Item = &reqwest::header::HeaderValue>, url: &Url) {
        let parsed: Vec<Cookie> = cookie_headers
            .filter_map(|value| value.to_str().ok())
            .filter_map(|header| Cookie::parse(header, url))
            .collect();
        if !parsed.is_empty() {
            self.save(url, parsed);
        }
    }

    fn cookies(&self, url: &Url) -> Option<reqwest::header::HeaderValue> {
        self.header_for(url)
            .and_then(|header| reqwest::header::HeaderValue::from_str(&header).ok())
    }
}
