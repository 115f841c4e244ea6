//! Summary Statistics
//!
//! One summary per unit, over the timings of its measured runs. The mean is
//! the plain arithmetic mean of every measured run; nothing is trimmed, so
//! the report total stays a simple sum of per-unit means.

use crate::order::{median, sorted};

/// Statistics of one unit's timings, in seconds
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryStatistics {
    /// Arithmetic mean
    pub mean: f64,
    /// Median
    pub median: f64,
    /// Sample standard deviation, `0.0` below two runs
    pub std_dev: f64,
    /// Fastest run
    pub min: f64,
    /// Slowest run
    pub max: f64,
    /// Runs summarized
    pub sample_count: usize,
}

/// Summarize a series of timings
///
/// An empty series summarizes to all zeros; callers that need at least one
/// measured run check that before getting here (see [`crate::discard_warmup`]).
pub fn compute_summary(series: &[f64]) -> SummaryStatistics {
    let ascending = sorted(series);
    let (Some(&min), Some(&max)) = (ascending.first(), ascending.last()) else {
        return SummaryStatistics {
            mean: 0.0,
            median: 0.0,
            std_dev: 0.0,
            min: 0.0,
            max: 0.0,
            sample_count: 0,
        };
    };

    let n = ascending.len() as f64;
    let mean = ascending.iter().sum::<f64>() / n;
    let std_dev = if ascending.len() > 1 {
        let squares: f64 = ascending.iter().map(|t| (t - mean) * (t - mean)).sum();
        (squares / (n - 1.0)).sqrt()
    } else {
        0.0
    };

    SummaryStatistics {
        mean,
        median: median(&ascending).unwrap_or(mean),
        std_dev,
        min,
        max,
        sample_count: ascending.len(),
    }
}
