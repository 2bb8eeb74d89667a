// report.rs — the one-line run report.
//
// Format:  pi ~= 3.14159 in 412 ms (10000000000 samples, gpu: <adapter>)
//
// The estimate is printed with 6 significant digits. Elapsed time is the
// wall-clock duration of the whole pipeline, measured by the caller and
// handed in, not read from any ambient timer.

use std::fmt;
use std::time::Duration;

/// Significant digits used for the estimate.
pub const REPORT_PRECISION: usize = 6;

/// Outcome of one complete run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Mean of the per-seed estimates.
    pub estimate: f64,
    /// Wall-clock time from seed generation to aggregation.
    pub elapsed: Duration,
    /// Number of seeds (lanes that produced an estimate).
    pub num_seeds: usize,
    /// Total PCG draws (`num_seeds × iterations`).
    pub total_samples: u64,
    /// Human-readable backend, e.g. `cpu` or `gpu: NVIDIA GeForce RTX 3060`.
    pub backend: String,
}

impl RunReport {
    /// Absolute error against `std::f64::consts::PI`.
    pub fn abs_error(&self) -> f64 {
        (self.estimate - std::f64::consts::PI).abs()
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "pi ~= {} in {} ms ({} samples, {})",
            format_significant(self.estimate, REPORT_PRECISION),
            self.elapsed.as_millis(),
            self.total_samples,
            self.backend
        )
    }
}

/// Format `value` with `digits` significant digits.
///
/// Fixed notation while the decimal exponent is in `-6..digits`, scientific
/// notation with an explicitly signed exponent (`1.23457e+6`) outside it.
/// Non-finite values print as Rust formats them.
pub fn format_significant(value: f64, digits: usize) -> String {
    let digits = digits.max(1);
    if !value.is_finite() {
        return format!("{value}");
    }
    if value == 0.0 {
        return format!("{:.*}", digits - 1, 0.0);
    }

    let mut exponent = value.abs().log10().floor() as i32;
    // Rounding to `digits` may carry into the next decade (9.999996 → 10.0000).
    let scaled = value.abs() / 10f64.powi(exponent - digits as i32 + 1);
    if scaled.round() >= 10f64.powi(digits as i32) {
        exponent += 1;
    }

    if exponent < -6 || exponent >= digits as i32 {
        let sci = format!("{:.*e}", digits - 1, value);
        match sci.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => sci,
        }
    } else {
        let decimals = (digits as i32 - 1 - exponent).max(0) as usize;
        format!("{value:.decimals$}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pi_six_digits() {
        assert_eq!(format_significant(std::f64::consts::PI, 6), "3.14159");
        assert_eq!(format_significant(3.1606457, 6), "3.16065");
    }

    #[test]
    fn test_carry_into_next_decade() {
        assert_eq!(format_significant(9.999996, 6), "10.0000");
    }

    #[test]
    fn test_small_and_large() {
        assert_eq!(format_significant(0.000123, 6), "0.000123000");
        assert_eq!(format_significant(1234567.0, 6), "1.23457e+6");
        assert_eq!(format_significant(-1234567.0, 6), "-1.23457e+6");
        assert_eq!(format_significant(0.000000123, 6), "1.23000e-7");
        assert_eq!(format_significant(0.00000123, 6), "0.00000123000");
        assert_eq!(format_significant(0.0, 6), "0.00000");
    }

    #[test]
    fn test_non_finite() {
        assert_eq!(format_significant(f64::NAN, 6), "NaN");
        assert_eq!(format_significant(f64::INFINITY, 6), "inf");
    }

    #[test]
    fn test_report_line() {
        let r = RunReport {
            estimate: 3.1415926,
            elapsed: Duration::from_millis(412),
            num_seeds: 1_000_000,
            total_samples: 10_000_000_000,
            backend: "cpu".into(),
        };
        assert_eq!(r.to_string(), "pi ~= 3.14159 in 412 ms (10000000000 samples, cpu)");
        assert!(r.abs_error() < 1e-6);
    }
}
