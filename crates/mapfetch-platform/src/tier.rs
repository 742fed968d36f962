//! Capability tier and the platform descriptor handed to the fetch core.

use crate::arch::{self, Arch};
use crate::os::{self, Os, OsVersion};

/// Per-host request cap on platforms with a stable TLS stack.
pub const CAPABLE_MAX_REQUESTS_PER_HOST: usize = 20;

/// Per-host request cap on legacy platforms. Android before 5.0 crashes in
/// the platform SSL library under many concurrent handshakes.
pub const LEGACY_MAX_REQUESTS_PER_HOST: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlatformTier {
    #[default]
    Capable,
    Legacy,
}

impl PlatformTier {
    pub fn classify(os: Os, version: &OsVersion) -> Self {
        match (os, version.major()) {
            (Os::Android, Some(major)) if major < 5 => PlatformTier::Legacy,
            _ => PlatformTier::Capable,
        }
    }

    pub fn max_requests_per_host(&self) -> usize {
        match self {
            PlatformTier::Capable => CAPABLE_MAX_REQUESTS_PER_HOST,
            PlatformTier::Legacy => LEGACY_MAX_REQUESTS_PER_HOST,
        }
    }
}

/// Everything the loader needs to know about where it runs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    pub os: Os,
    pub os_version: OsVersion,
    pub arch: Arch,
    pub tier: PlatformTier,
}

impl Platform {
    pub fn new(os: Os, os_version: OsVersion, arch: Arch) -> Self {
        let tier = PlatformTier::classify(os, &os_version);
        Self {
            os,
            os_version,
            arch,
            tier,
        }
    }

    pub fn current() -> Self {
        Self::new(os::detect(), os::version(), arch::detect())
    }

    pub fn abi(&self) -> &'static str {
        self.arch.abi()
    }
}
