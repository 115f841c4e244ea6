//! Aggregation Across Outer Runs
//!
//! Each outer run yields one mean per unit. Leading runs can be discarded as
//! warm-up; the kept runs are summarized per unit. The total is always the sum
//! of per-unit means, never a value read back from a driver.

use crate::raw::RawReport;
use daybench_core::DayId;
use daybench_stats::{SummaryStatistics, WarmupError, compute_summary, discard_warmup};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Errors raised while combining raw reports
#[derive(Debug, Error)]
pub enum AggregateError {
    /// Warm-up discarding left nothing
    #[error("No runs left to aggregate: {0}")]
    NoMeasuredRuns(#[from] WarmupError),

    /// A run reported a different set of days
    #[error("Run {run} reports days [{found}], expected [{expected}]")]
    UnitMismatch {
        /// 1-based run index
        run: usize,
        /// Days expected
        expected: String,
        /// Days in the report
        found: String,
    },
}

/// Timing statistics for one unit, in seconds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitTiming {
    /// Day
    pub id: DayId,
    /// Mean over measured runs
    pub mean_secs: f64,
    /// Median over measured runs
    pub median_secs: f64,
    /// Sample standard deviation
    pub std_dev_secs: f64,
    /// Fastest run
    pub min_secs: f64,
    /// Slowest run
    pub max_secs: f64,
    /// Measured runs
    pub runs: usize,
}

impl UnitTiming {
    fn from_summary(id: DayId, stats: &SummaryStatistics) -> Self {
        Self {
            id,
            mean_secs: stats.mean,
            median_secs: stats.median,
            std_dev_secs: stats.std_dev,
            min_secs: stats.min,
            max_secs: stats.max,
            runs: stats.sample_count,
        }
    }
}

/// Per-unit results of a benchmark session
#[derive(Debug, Clone, PartialEq)]
pub struct AggregateReport {
    units: Vec<UnitTiming>,
    runs_measured: usize,
    runs_discarded: usize,
}

impl AggregateReport {
    /// Unit timings, ascending by identifier
    pub fn units(&self) -> &[UnitTiming] {
        &self.units
    }

    /// Timing of one unit
    pub fn get(&self, id: DayId) -> Option<&UnitTiming> {
        self.units.iter().find(|u| u.id == id)
    }

    /// Sum of per-unit means
    pub fn total_secs(&self) -> f64 {
        self.units.iter().map(|u| u.mean_secs).sum()
    }

    /// Outer runs that contributed samples
    pub fn runs_measured(&self) -> usize {
        self.runs_measured
    }

    /// Outer runs discarded as warm-up
    pub fn runs_discarded(&self) -> usize {
        self.runs_discarded
    }

    /// Flat means keyed like the driver's report (`"07"`, ..., `"total"`)
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let mut map: BTreeMap<String, f64> = self
            .units
            .iter()
            .map(|u| (u.id.key(), u.mean_secs))
            .collect();
        map.insert(crate::raw::TOTAL_KEY.to_string(), self.total_secs());
        map
    }
}

/// Summarize `runs` after discarding the first `warmup_runs` of them
///
/// Every run, warm-up included, must report the same set of units.
pub fn aggregate(
    runs: &[RawReport],
    warmup_runs: usize,
) -> Result<AggregateReport, AggregateError> {
    let first = runs.first().ok_or(WarmupError {
        samples: 0,
        warmup: warmup_runs,
    })?;

    let expected: BTreeSet<DayId> = first.units().keys().copied().collect();
    for (index, run) in runs.iter().enumerate().skip(1) {
        check_units(run, index + 1, &expected)?;
    }

    let ids: Vec<DayId> = expected.into_iter().collect();
    let units = ids
        .par_iter()
        .map(|&id| {
            let series: Vec<f64> = runs.iter().filter_map(|run| run.get(id)).collect();
            let measured = discard_warmup(&series, warmup_runs)?;
            Ok(UnitTiming::from_summary(id, &compute_summary(measured)))
        })
        .collect::<Result<Vec<_>, WarmupError>>()?;

    let runs_measured = runs.len() - warmup_runs;
    tracing::debug!(
        units = units.len(),
        measured = runs_measured,
        discarded = warmup_runs,
        "aggregated outer runs"
    );

    Ok(AggregateReport {
        units,
        runs_measured,
        runs_discarded: warmup_runs,
    })
}

/// Check that run number `run` (1-based) reports exactly the `expected` units
pub fn check_units(
    report: &RawReport,
    run: usize,
    expected: &BTreeSet<DayId>,
) -> Result<(), AggregateError> {
    let found: BTreeSet<DayId> = report.units().keys().copied().collect();
    if &found != expected {
        return Err(AggregateError::UnitMismatch {
            run,
            expected: join_ids(expected),
            found: join_ids(&found),
        });
    }
    Ok(())
}

fn join_ids(ids: &BTreeSet<DayId>) -> String {
    ids.iter().map(|id| id.key()).collect::<Vec<_>>().join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raw::parse;

    fn day(n: u32) -> DayId {
        DayId::new(n).unwrap()
    }

    #[test]
    fn test_single_run_total_is_sum_of_means() {
        let run = parse(r#"{"01": 2.0, "02": 3.0, "total": 5.0}"#).unwrap();
        let report = aggregate(&[run], 0).unwrap();

        assert_eq!(report.get(day(1)).unwrap().mean_secs, 2.0);
        assert_eq!(report.get(day(2)).unwrap().mean_secs, 3.0);
        assert_eq!(report.total_secs(), 5.0);

        let map = report.to_map();
        assert_eq!(map.get("01"), Some(&2.0));
        assert_eq!(map.get("02"), Some(&3.0));
        assert_eq!(map.get("total"), Some(&5.0));
        assert_eq!(map.len(), 3);
    }

    #[test]
    fn test_warmup_runs_discarded() {
        let runs = vec![
            parse(r#"{"01": 9.0, "total": 9.0}"#).unwrap(),
            parse(r#"{"01": 1.0, "total": 1.0}"#).unwrap(),
            parse(r#"{"01": 3.0, "total": 3.0}"#).unwrap(),
        ];
        let report = aggregate(&runs, 1).unwrap();
        let timing = report.get(day(1)).unwrap();

        assert_eq!(timing.mean_secs, 2.0);
        assert_eq!(timing.min_secs, 1.0);
        assert_eq!(timing.max_secs, 3.0);
        assert_eq!(timing.runs, 2);
        assert_eq!(report.runs_measured(), 2);
        assert_eq!(report.runs_discarded(), 1);
    }

    #[test]
    fn test_units_in_identifier_order() {
        let run = parse(r#"{"10": 1.0, "02": 1.0, "total": 2.0}"#).unwrap();
        let report = aggregate(&[run], 0).unwrap();
        let ids: Vec<u32> = report.units().iter().map(|u| u.id.get()).collect();
        assert_eq!(ids, vec![2, 10]);
    }

    #[test]
    fn test_all_runs_discarded() {
        let run = parse(r#"{"01": 1.0, "total": 1.0}"#).unwrap();
        assert!(matches!(
            aggregate(&[run], 1),
            Err(AggregateError::NoMeasuredRuns(WarmupError {
                samples: 1,
                warmup: 1
            }))
        ));
        assert!(aggregate(&[], 0).is_err());
    }

    #[test]
    fn test_unit_set_must_match_across_runs() {
        let runs = vec![
            parse(r#"{"01": 1.0, "02": 1.0, "total": 2.0}"#).unwrap(),
            parse(r#"{"01": 1.0, "total": 1.0}"#).unwrap(),
        ];
        let err = aggregate(&runs, 0).unwrap_err();
        assert!(matches!(err, AggregateError::UnitMismatch { run: 2, .. }));
    }

    #[test]
    fn test_check_units_against_discovered_set() {
        let run = parse(r#"{"01": 2.0, "03": 3.0, "total": 5.0}"#).unwrap();
        let discovered: BTreeSet<DayId> = [day(1), day(2), day(3)].into_iter().collect();

        let err = check_units(&run, 1, &discovered).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Run 1 reports days [01, 03], expected [01, 02, 03]"
        );

        let covered: BTreeSet<DayId> = [day(1), day(3)].into_iter().collect();
        assert!(check_units(&run, 1, &covered).is_ok());
    }
}
