//! Order Statistics
//!
//! Timings are finite by the time they get here (the report parser rejects
//! anything else), so a total order on `f64` is safe.

/// Sort a copy of the series in ascending order
pub(crate) fn sorted(series: &[f64]) -> Vec<f64> {
    let mut sorted = series.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Middle value of an ascending series; the two middle values are averaged
/// for an even length. `None` for an empty series.
pub fn median(ascending: &[f64]) -> Option<f64> {
    let n = ascending.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(ascending[n / 2]),
        _ => Some((ascending[n / 2 - 1] + ascending[n / 2]) / 2.0),
    }
}
