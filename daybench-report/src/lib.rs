#![warn(missing_docs)]
//! daybench Report - Timing Reports
//!
//! Reads the per-run reports written by the compiled driver, combines them
//! across outer runs, and renders the result:
//! - Human-readable table (terminal)
//! - JSON (machine-readable, with session metadata)
//! - Flat timings (the driver's own `{"NN": secs, "total": secs}` layout)

mod aggregate;
mod json;
mod raw;
mod report;
mod table;

pub use aggregate::{AggregateError, AggregateReport, UnitTiming, aggregate, check_units};
pub use json::{generate_json_report, generate_timings_json};
pub use raw::{RawReport, ReportParseError, TOTAL_KEY, load, parse};
pub use report::{BenchReport, ReportConfig, ReportMeta, SCHEMA_VERSION, SystemInfo};
pub use table::render;

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable terminal table
    #[default]
    Human,
    /// Full JSON report with metadata
    Json,
    /// Flat per-unit means and total
    Timings,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" | "text" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            "timings" => Ok(OutputFormat::Timings),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}
