//! Platform Families

use serde::{Deserialize, Serialize};
use std::fmt;

/// Platform family, which decides the PGO strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformFamily {
    /// gcc-style instrumentation, fragments consumed directly
    Linux,
    /// clang-style instrumentation, fragments merged before use
    MacOs,
    /// No PGO: single plain compile
    Other,
}

impl PlatformFamily {
    /// Family of the host running this process
    pub fn detect() -> Self {
        Self::from_os(std::env::consts::OS)
    }

    /// Family for an OS name as reported by `std::env::consts::OS`
    pub fn from_os(os: &str) -> Self {
        match os {
            "linux" => PlatformFamily::Linux,
            "macos" => PlatformFamily::MacOs,
            _ => PlatformFamily::Other,
        }
    }

    /// Lowercase name, as accepted by `FromStr`
    pub fn as_str(self) -> &'static str {
        match self {
            PlatformFamily::Linux => "linux",
            PlatformFamily::MacOs => "macos",
            PlatformFamily::Other => "other",
        }
    }
}

impl fmt::Display for PlatformFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PlatformFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "linux" | "gcc" => Ok(PlatformFamily::Linux),
            "macos" | "darwin" | "clang" => Ok(PlatformFamily::MacOs),
            "other" | "none" | "plain" => Ok(PlatformFamily::Other),
            other => Err(format!("Unknown platform: {}", other)),
        }
    }
}
