//! Report Data Structures

use crate::aggregate::{AggregateReport, UnitTiming};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Current version of the JSON document layout
pub const SCHEMA_VERSION: u32 = 1;

/// Complete benchmark session report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    /// Session metadata
    pub meta: ReportMeta,
    /// Per-day statistics
    pub units: Vec<UnitTiming>,
    /// Sum of per-day means
    pub total_secs: f64,
}

impl BenchReport {
    /// Build the durable report for an aggregated session
    pub fn new(meta: ReportMeta, aggregate: &AggregateReport) -> Self {
        Self {
            meta,
            units: aggregate.units().to_vec(),
            total_secs: aggregate.total_secs(),
        }
    }
}

/// Report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMeta {
    /// Report schema version
    pub schema_version: u32,
    /// daybench version
    pub version: String,
    /// When the report was generated
    pub timestamp: DateTime<Utc>,
    /// Commit of the current directory, if any
    pub git_commit: Option<String>,
    /// Branch of the current directory, if any
    pub git_branch: Option<String>,
    /// Host description
    pub system: SystemInfo,
    /// Session settings
    pub config: ReportConfig,
}

/// Session configuration captured in report metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// PGO family used for the build (`linux`, `macos`, `other`)
    pub platform: String,
    /// Driver-internal repetitions (`None` = driver default)
    pub repetitions: Option<u32>,
    /// Outer launches
    pub runs: usize,
    /// Leading launches discarded
    pub warmup_runs: usize,
    /// Compiler program
    pub compiler: String,
    /// Base optimization flags
    pub compiler_flags: Vec<String>,
}

/// System information
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// Operating system
    pub os: String,
    /// Kernel release (architecture where unknown)
    pub os_version: String,
    /// CPU model
    pub cpu: String,
    /// Available cores
    pub cpu_cores: u32,
}
