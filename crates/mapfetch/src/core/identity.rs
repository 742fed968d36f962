//! The identifying `User-Agent` header.

use mapfetch_platform::Platform;

use crate::data::FetchConfig;

/// Replace every character outside printable ASCII with `?`.
///
/// Header values must be visible ASCII; product names and OS strings coming
/// from the platform are not guaranteed to be.
pub fn to_human_readable_ascii(s: &str) -> String {
    s.chars()
        .map(|c| if (' '..='~').contains(&c) { c } else { '?' })
        .collect()
}

/// `"{product} {version} ({revision}) {os}/{os_version} ({abi})"`, ASCII only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAgent(String);

impl UserAgent {
    pub fn new(product: &str, version: &str, revision: &str, platform: &Platform) -> Self {
        let raw = format!(
            "{product} {version} ({revision}) {}/{} ({})",
            platform.os,
            platform.os_version,
            platform.abi()
        );
        Self(to_human_readable_ascii(&raw))
    }

    pub fn from_config(config: &FetchConfig, platform: &Platform) -> Self {
        Self::new(&config.product, &config.sdk_version, &config.revision, platform)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mapfetch_platform::arch::Arch;
    use mapfetch_platform::os::{Os, OsVersion};

    #[test]
    fn ascii_filter_replaces_non_printables() {
        assert_eq!(to_human_readable_ascii("plain ascii ~"), "plain ascii ~");
        assert_eq!(to_human_readable_ascii("caf\u{e9}"), "caf?");
        assert_eq!(to_human_readable_ascii("tab\there\n"), "tab?here?");
        assert_eq!(to_human_readable_ascii("\u{1F5FA}map"), "?map");
    }

    #[test]
    fn user_agent_layout() {
        let platform = Platform::new(Os::Android, OsVersion::parse("34").unwrap(), Arch::ARM64);
        let ua = UserAgent::new("MapFetch", "11.5.2", "a1b2c3d", &platform);
        assert_eq!(ua.as_str(), "MapFetch 11.5.2 (a1b2c3d) Android/34 (arm64-v8a)");
    }

    #[test]
    fn user_agent_is_ascii_even_with_exotic_product() {
        let platform = Platform::new(Os::Linux, OsVersion::parse("6.1").unwrap(), Arch::X86_64);
        let ua = UserAgent::new("Kart\u{e4}", "1.0", "dev", &platform);
        assert!(ua.as_str().is_ascii());
        assert!(ua.as_str().starts_with("Kart? 1.0 (dev) Linux/6.1"));
    }
}
