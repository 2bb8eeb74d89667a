// aggregate.rs — host-side reduction of per-seed estimates.

use crate::error::{EstimatorError, EstimatorResult};

/// Mean of the per-seed estimates, plus how many went into it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AggregateResult {
    pub mean: f64,
    pub count: usize,
}

/// Arithmetic mean of `estimates`.
///
/// Accumulates in f64 so that a million f32 terms do not lose the low digits
/// of the mean. NaN or infinite inputs propagate through the sum unchanged.
pub fn aggregate(estimates: &[f32]) -> EstimatorResult<AggregateResult> {
    if estimates.is_empty() {
        return Err(EstimatorError::EmptyEstimates);
    }
    let sum: f64 = estimates.iter().map(|&v| v as f64).sum();
    Ok(AggregateResult {
        mean: sum / estimates.len() as f64,
        count: estimates.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_empty_is_an_error() {
        assert!(matches!(aggregate(&[]), Err(EstimatorError::EmptyEstimates)));
    }

    #[test]
    fn test_single_value_is_its_own_mean() {
        let r = aggregate(&[3.1606457]).unwrap();
        assert_eq!(r.count, 1);
        assert_eq!(r.mean, 3.1606457f32 as f64);
    }

    #[test]
    fn test_mean() {
        let r = aggregate(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(r.count, 4);
        assert_relative_eq!(r.mean, 2.5);
    }

    #[test]
    fn test_nan_propagates() {
        let r = aggregate(&[3.0, f32::NAN, 3.2]).unwrap();
        assert!(r.mean.is_nan());
    }
}
