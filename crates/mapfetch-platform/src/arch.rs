//! Architecture and ABI detection.

use std::str::FromStr;

use crate::error::Error;

/// CPU architecture types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86,
    X86_64,
    ARM,
    ARM64,
    Unknown,
}

impl Arch {
    /// Primary ABI name, spelled the way Android reports `SUPPORTED_ABIS[0]`.
    pub fn abi(&self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::X86_64 => "x86_64",
            Arch::ARM => "armeabi-v7a",
            Arch::ARM64 => "arm64-v8a",
            Arch::Unknown => "unknown",
        }
    }

    /// Inverse of [`Arch::abi`].
    pub fn from_abi(abi: &str) -> Result<Self, Error> {
        match abi {
            "x86" => Ok(Arch::X86),
            "x86_64" => Ok(Arch::X86_64),
            "armeabi-v7a" | "armeabi" => Ok(Arch::ARM),
            "arm64-v8a" => Ok(Arch::ARM64),
            other => Err(Error::UnknownAbi(other.to_string())),
        }
    }
}

impl FromStr for Arch {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "i386" | "i686" | "x86" => Ok(Arch::X86),
            "x86_64" | "amd64" => Ok(Arch::X86_64),
            "arm" | "armv7l" | "armv7" => Ok(Arch::ARM),
            "aarch64" | "arm64" => Ok(Arch::ARM64),
            other => Err(Error::UnknownArch(other.to_string())),
        }
    }
}

/// Detect the architecture this binary was built for.
///
/// The ABI that matters for the identifying header is the one the loader
/// runs as, which on a 32-bit build on 64-bit hardware differs from the CPU.
pub fn detect() -> Arch {
    std::env::consts::ARCH.parse().unwrap_or(Arch::Unknown)
}
