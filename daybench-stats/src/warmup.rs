//! Warm-up Discarding
//!
//! The first sample(s) of a series include one-time costs (page faults, cold
//! caches, lazy initialization) and are dropped before any mean is taken.

/// Returned when discarding leaves nothing to average
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{samples} sample(s) with {warmup} warm-up leaves no measured sample")]
pub struct WarmupError {
    /// Samples available
    pub samples: usize,
    /// Samples requested to be discarded
    pub warmup: usize,
}

/// The measured part of a series: everything after the first `warmup` samples
pub fn discard_warmup(samples: &[f64], warmup: usize) -> Result<&[f64], WarmupError> {
    if samples.len() <= warmup {
        return Err(WarmupError {
            samples: samples.len(),
            warmup,
        });
    }
    Ok(&samples[warmup..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inflated_warmup_excluded() {
        let samples = [10.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(discard_warmup(&samples, 1).unwrap(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_mean_after_warmup() {
        let samples = [10.0, 1.0, 1.0, 1.0, 1.0];
        let measured = discard_warmup(&samples, 1).unwrap();
        assert_eq!(crate::compute_summary(measured).mean, 1.0);
        assert_eq!(crate::compute_summary(&samples).mean, 2.8);
    }

    #[test]
    fn test_multiple_warmup_samples() {
        let samples = [9.0, 9.0, 9.0, 2.0, 4.0];
        assert_eq!(discard_warmup(&samples, 3).unwrap(), &[2.0, 4.0]);
    }

    #[test]
    fn test_zero_warmup_keeps_everything() {
        let samples = [1.0, 2.0, 3.0];
        assert_eq!(discard_warmup(&samples, 0).unwrap(), &samples);
    }

    #[test]
    fn test_nothing_left_after_warmup() {
        assert_eq!(
            discard_warmup(&[5.0], 1),
            Err(WarmupError {
                samples: 1,
                warmup: 1
            })
        );
        assert!(discard_warmup(&[], 0).is_err());
    }
}
