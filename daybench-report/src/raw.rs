//! Raw Driver Reports
//!
//! The compiled driver writes one flat JSON object per run:
//!
//! ```text
//! {
//!   "01": 0.012,
//!   "02": 0.340,
//!   "total": 0.352
//! }
//! ```
//!
//! Keys are zero-padded day identifiers plus `total`; values are seconds with
//! three decimals. Anything else means the file cannot be trusted, so parsing
//! is strict and there is no partial result.

use daybench_core::DayId;
use serde::de::{Deserialize, Deserializer, MapAccess, Visitor};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Key holding the driver's own total
pub const TOTAL_KEY: &str = "total";

/// Largest rounding error of one value written with three decimals
const ROUNDING_ERROR: f64 = 0.0005;

/// Errors raised while reading a raw report
#[derive(Debug, Error)]
pub enum ReportParseError {
    /// The report could not be read
    #[error("Failed to read report {}: {source}", .path.display())]
    Io {
        /// Path involved
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Not a JSON object of numbers
    #[error("Malformed report: {0}")]
    Json(#[from] serde_json::Error),

    /// Key is neither a canonical day nor `total`
    #[error("Invalid unit key '{0}' (expected a zero-padded day identifier)")]
    InvalidKey(String),

    /// Negative or non-finite timing
    #[error("Invalid timing for '{key}': {value}")]
    InvalidValue {
        /// Report key
        key: String,
        /// Rejected value
        value: f64,
    },

    /// The same key appears twice
    #[error("Duplicate entry '{0}'")]
    DuplicateKey(String),

    /// No `total` entry
    #[error("Report has no '{TOTAL_KEY}' entry")]
    MissingTotal,

    /// Only a `total` entry
    #[error("Report has no unit entries")]
    Empty,

    /// Stored total disagrees with the unit sum
    #[error("Report total {stored:.3}s does not match the sum of its units {computed:.3}s")]
    TotalMismatch {
        /// Total written by the driver
        stored: f64,
        /// Sum of the unit timings
        computed: f64,
    },
}

/// One run's per-unit means as written by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct RawReport {
    units: BTreeMap<DayId, f64>,
    stored_total: f64,
}

impl RawReport {
    /// Per-unit mean seconds, ascending by identifier
    pub fn units(&self) -> &BTreeMap<DayId, f64> {
        &self.units
    }

    /// Mean seconds for one unit
    pub fn get(&self, id: DayId) -> Option<f64> {
        self.units.get(&id).copied()
    }

    /// Total as written by the driver (validated against the units on load)
    pub fn stored_total(&self) -> f64 {
        self.stored_total
    }

    /// Sum of per-unit means
    pub fn total(&self) -> f64 {
        self.units.values().sum()
    }
}

/// Read and validate a raw report file
pub fn load(path: &Path) -> Result<RawReport, ReportParseError> {
    let text = std::fs::read_to_string(path).map_err(|source| ReportParseError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse(&text)
}

/// Parse and validate raw report text
pub fn parse(text: &str) -> Result<RawReport, ReportParseError> {
    let Entries(entries) = serde_json::from_str(text)?;

    let mut units = BTreeMap::new();
    let mut stored_total = None;

    for (key, value) in entries {
        if !value.is_finite() || value < 0.0 {
            return Err(ReportParseError::InvalidValue { key, value });
        }
        if key == TOTAL_KEY {
            if stored_total.replace(value).is_some() {
                return Err(ReportParseError::DuplicateKey(key));
            }
            continue;
        }

        let id = parse_unit_key(&key)?;
        if units.insert(id, value).is_some() {
            return Err(ReportParseError::DuplicateKey(key));
        }
    }

    let stored_total = stored_total.ok_or(ReportParseError::MissingTotal)?;
    if units.is_empty() {
        return Err(ReportParseError::Empty);
    }

    let computed: f64 = units.values().sum();
    let tolerance = ROUNDING_ERROR * (units.len() + 1) as f64 + 1e-9;
    if (computed - stored_total).abs() > tolerance {
        return Err(ReportParseError::TotalMismatch {
            stored: stored_total,
            computed,
        });
    }

    Ok(RawReport {
        units,
        stored_total,
    })
}

/// Object entries in document order, duplicates preserved
struct Entries(Vec<(String, f64)>);

impl<'de> Deserialize<'de> for Entries {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct EntriesVisitor;

        impl<'de> Visitor<'de> for EntriesVisitor {
            type Value = Entries;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("an object of numeric timings")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Entries, A::Error> {
                let mut entries = Vec::with_capacity(map.size_hint().unwrap_or(0));
                while let Some(entry) = map.next_entry::<String, f64>()? {
                    entries.push(entry);
                }
                Ok(Entries(entries))
            }
        }

        deserializer.deserialize_map(EntriesVisitor)
    }
}

/// Keys must be canonical: digits only, zero-padded to two places
fn parse_unit_key(key: &str) -> Result<DayId, ReportParseError> {
    let invalid = || ReportParseError::InvalidKey(key.to_string());
    if !key.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid());
    }
    let id = key
        .parse::<u32>()
        .ok()
        .and_then(DayId::new)
        .ok_or_else(invalid)?;
    if id.key() != key {
        return Err(invalid());
    }
    Ok(id)
}
