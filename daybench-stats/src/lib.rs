#![warn(missing_docs)]
//! daybench Statistical Engine
//!
//! Statistics over per-unit timings (seconds):
//! - Warm-up discarding (leading runs never reach a mean)
//! - Summary statistics (mean, median, stddev, extremes)

mod order;
mod summary;
mod warmup;

pub use order::median;
pub use summary::{SummaryStatistics, compute_summary};
pub use warmup::{WarmupError, discard_warmup};
