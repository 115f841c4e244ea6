#![warn(missing_docs)]
//! daybench Core - Units and Working Directory
//!
//! This crate provides the leaves of the benchmark pipeline:
//! - `Unit` and `DayId`, the addressable day solutions
//! - Unit discovery from a source directory (numeric ordering)
//! - The working directory: staged sources, cached inputs, exclusive lock
//! - Fetcher collaborator traits with an HTTP implementation

mod fetch;
mod registry;
mod workdir;

pub use fetch::{FetchError, Fetcher, HttpFetcher, parse_expected_answers};
pub use registry::{
    DEFAULT_EXTENSION, DaySelection, DiscoveryError, discover, discover_with_extension,
};
pub use workdir::{InputStatus, REPORT_FILE, WorkDir, WorkDirError, WorkDirLock};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Identifier of a day solution (always positive)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayId(u32);

impl DayId {
    /// Create an identifier, rejecting zero
    pub fn new(value: u32) -> Option<Self> {
        (value > 0).then_some(Self(value))
    }

    /// Raw numeric value
    pub fn get(self) -> u32 {
        self.0
    }

    /// Stable report key: the identifier zero-padded to two digits
    pub fn key(self) -> String {
        format!("{:02}", self.0)
    }
}

impl fmt::Display for DayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

impl std::str::FromStr for DayId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value: u32 = s
            .trim()
            .parse()
            .map_err(|_| format!("Invalid day identifier: {}", s))?;
        DayId::new(value).ok_or_else(|| format!("Day identifier must be positive: {}", s))
    }
}

/// One independently compiled solution program
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unit {
    id: DayId,
    source: PathBuf,
}

impl Unit {
    /// Create a unit from its identifier and source file
    pub fn new(id: DayId, source: impl Into<PathBuf>) -> Self {
        Self {
            id,
            source: source.into(),
        }
    }

    /// Unit identifier
    pub fn id(&self) -> DayId {
        self.id
    }

    /// Path of the unit's source file as discovered
    pub fn source(&self) -> &Path {
        &self.source
    }

    /// Module name the unit is imported under (`day07`)
    pub fn module_name(&self) -> String {
        format!("day{}", self.id)
    }

    /// Fully qualified entry point (`day07::main`)
    pub fn entry_symbol(&self) -> String {
        format!("{}::main", self.module_name())
    }

    /// Input file name inside the working directory (`07.in`)
    pub fn input_file_name(&self) -> String {
        format!("{}.in", self.id)
    }
}
