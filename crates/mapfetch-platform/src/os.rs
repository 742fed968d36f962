//! Operating system and version detection.

use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use sysinfo::System;

use crate::error::Error;

/// Operating system families the loader reports in its identifying header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Android,
    Ios,
    Linux,
    Macos,
    Windows,
    Unknown,
}

impl Os {
    /// Name used in the `User-Agent` product token.
    pub fn as_str(&self) -> &'static str {
        match self {
            Os::Android => "Android",
            Os::Ios => "iOS",
            Os::Linux => "Linux",
            Os::Macos => "macOS",
            Os::Windows => "Windows",
            Os::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Os {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "android" => Ok(Os::Android),
            "ios" => Ok(Os::Ios),
            "linux" => Ok(Os::Linux),
            "macos" | "darwin" => Ok(Os::Macos),
            "windows" => Ok(Os::Windows),
            other => Err(Error::UnknownOs(other.to_string())),
        }
    }
}

/// Dotted OS version, e.g. `4.4` or `14`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OsVersion {
    raw: String,
    major: Option<u32>,
}

impl OsVersion {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(Error::InvalidVersion(raw.to_string()));
        }
        let major = raw
            .split(['.', ' ', '-'])
            .next()
            .and_then(|m| m.parse::<u32>().ok());
        Ok(Self {
            raw: raw.to_string(),
            major,
        })
    }

    pub fn unknown() -> Self {
        Self {
            raw: "unknown".to_string(),
            major: None,
        }
    }

    pub fn major(&self) -> Option<u32> {
        self.major
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for OsVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

static SYSTEM_INFO: Lazy<SystemInfo> = Lazy::new(SystemInfo::load);

struct SystemInfo {
    os: Os,
    version: OsVersion,
}

impl SystemInfo {
    fn load() -> Self {
        let os = if cfg!(target_os = "android") {
            Os::Android
        } else if cfg!(target_os = "ios") {
            Os::Ios
        } else {
            match System::name().as_deref() {
                Some("Windows") => Os::Windows,
                Some("Darwin") | Some("macOS") => Os::Macos,
                Some("Android") => Os::Android,
                Some(_) if cfg!(target_os = "linux") => Os::Linux,
                Some(name) => name.parse().unwrap_or(Os::Unknown),
                None => Os::Unknown,
            }
        };

        let version = System::os_version()
            .and_then(|v| OsVersion::parse(&v).ok())
            .unwrap_or_else(OsVersion::unknown);

        Self { os, version }
    }
}

/// Detect the current operating system.
pub fn detect() -> Os {
    SYSTEM_INFO.os
}

/// Version of the current operating system, `unknown` when it cannot be read.
pub fn version() -> OsVersion {
    SYSTEM_INFO.version.clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_dotted_versions() {
        let v = OsVersion::parse("4.4.2").unwrap();
        assert_eq!(v.major(), Some(4));
        assert_eq!(v.as_str(), "4.4.2");

        let v = OsVersion::parse("14").unwrap();
        assert_eq!(v.major(), Some(14));
    }

    #[test]
    fn non_numeric_version_has_no_major() {
        let v = OsVersion::parse("rolling").unwrap();
        assert_eq!(v.major(), None);
        assert!(OsVersion::parse("  ").is_err());
    }

    #[test]
    fn os_names_round_trip_through_from_str() {
        assert_eq!("android".parse::<Os>().unwrap(), Os::Android);
        assert_eq!("Darwin".parse::<Os>().unwrap(), Os::Macos);
        assert!("plan9".parse::<Os>().is_err());
        assert_eq!(Os::Ios.to_string(), "iOS");
    }

    #[test]
    fn detection_is_stable() {
        assert_eq!(detect(), detect());
        assert!(!version().as_str().is_empty());
    }
}
