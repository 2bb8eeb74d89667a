// pcg.rs — CPU reference for the Monte Carlo π kernel.
//
// This is the authoritative implementation of what `monte_carlo_pi.wgsl`
// computes per lane. Every GPU result is validated against it, and the CPU
// backend runs it directly.
//
// Algorithm (per seed):
//   state ← seed
//   repeat K times:
//     state ← pcg_hash(state)
//     x     ← state / (2^32 − 1)           (in [0, 1])
//     sum   += sqrt(1 − x²)                 (height of the unit quarter circle)
//     count += 1
//   estimate = 4 · sum / count
//
// The mean height of the quarter circle over [0, 1] is π/4, so each seed's
// estimate is a K-sample quadrature of π.
//
// ARITHMETIC PARITY WITH THE SHADER:
// Everything is f32 with one rounding per operation, in the same order as the
// WGSL. `count` is an f32 accumulator too (exact up to 2^24 iterations).
// Rust never contracts `a - b * c` into an FMA, so this function is
// bit-reproducible across platforms. GPU `sqrt` is not required to be
// correctly rounded, so GPU/CPU agreement is checked with a tolerance.

/// Multiplier of the LCG step.
pub const PCG_MULTIPLIER: u32 = 747_796_405;
/// Increment of the LCG step.
pub const PCG_INCREMENT: u32 = 2_891_336_453;
/// Output permutation multiplier.
pub const PCG_OUTPUT_MULTIPLIER: u32 = 277_803_737;

/// Scale mapping a raw `u32` draw onto [0, 1]. The shader uses the same
/// literal; in f32 it rounds to exactly 2^-32.
const UNIT_SCALE: f32 = 1.0 / 4_294_967_295.0;

/// One step of the PCG-RXS-M-XS hash: LCG advance, then output permutation.
///
/// The result is both the random draw and the next state.
#[inline]
pub fn pcg_hash(input: u32) -> u32 {
    let state = input
        .wrapping_mul(PCG_MULTIPLIER)
        .wrapping_add(PCG_INCREMENT);
    let word = ((state >> ((state >> 28) + 4)) ^ state).wrapping_mul(PCG_OUTPUT_MULTIPLIER);
    (word >> 22) ^ word
}

/// Map a raw draw onto the unit interval.
#[inline]
pub fn unit_interval(raw: u32) -> f32 {
    raw as f32 * UNIT_SCALE
}

/// Height of the unit quarter circle at `x`: `sqrt(1 − x²)`.
#[inline]
pub fn quarter_circle_height(x: f32) -> f32 {
    (1.0 - x * x).sqrt()
}

/// Per-seed π estimate over `iterations` PCG draws.
///
/// Seeds are the non-negative `i32` values the host generates; they are
/// reinterpreted as `u32` exactly as the shader's `u32(seed)` does.
pub fn estimate_for_seed(seed: i32, iterations: u32) -> f32 {
    let mut state = seed as u32;
    let mut sum = 0.0f32;
    let mut count = 0.0f32;
    for _ in 0..iterations {
        state = pcg_hash(state);
        sum += quarter_circle_height(unit_interval(state));
        count += 1.0;
    }
    4.0 * (sum / count)
}

/// Run the reference kernel over every seed. Output index `i` corresponds to
/// `seeds[i]`.
pub fn estimate_all(seeds: &[i32], iterations: u32) -> Vec<f32> {
    seeds
        .iter()
        .map(|&s| estimate_for_seed(s, iterations))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_scale_is_two_pow_minus_32() {
        assert_eq!(UNIT_SCALE, 2.0f32.powi(-32));
    }

    #[test]
    fn test_pcg_hash_known_values() {
        assert_eq!(pcg_hash(0), 129_708_002);
        assert_eq!(pcg_hash(1), 2_831_084_092);
        assert_eq!(pcg_hash(pcg_hash(1)), 3_911_864_714);
    }

    #[test]
    fn test_pcg_hash_wraps_without_panicking() {
        // Debug builds would panic on a non-wrapping multiply here.
        let _ = pcg_hash(u32::MAX);
        let _ = pcg_hash(i32::MAX as u32);
    }

    #[test]
    fn test_unit_interval_bounds() {
        assert_eq!(unit_interval(0), 0.0);
        assert!(unit_interval(1 << 31) > 0.49 && unit_interval(1 << 31) < 0.51);
        // u32::MAX rounds up to 2^32 in f32, landing exactly on 1.0.
        assert_eq!(unit_interval(u32::MAX), 1.0);
    }

    #[test]
    fn test_quarter_circle_height() {
        assert_eq!(quarter_circle_height(0.0), 1.0);
        assert_eq!(quarter_circle_height(1.0), 0.0);
        let h = quarter_circle_height(0.6);
        assert!((h - 0.8).abs() < 1e-6, "h = {h}");
    }

    #[test]
    fn test_single_iteration_estimate() {
        let expected = 4.0 * quarter_circle_height(unit_interval(pcg_hash(1)));
        assert_eq!(estimate_for_seed(1, 1), expected);
        assert_eq!(estimate_for_seed(1, 1).to_bits(), 0x4040_8312);
    }

    #[test]
    fn test_estimate_is_deterministic() {
        let a = estimate_for_seed(987_654_321, 10_000);
        let b = estimate_for_seed(987_654_321, 10_000);
        assert_eq!(a.to_bits(), b.to_bits());
    }

    #[test]
    fn test_estimate_all_preserves_order() {
        let seeds = [5, 17, 0, 2_147_483_646];
        let all = estimate_all(&seeds, 100);
        assert_eq!(all.len(), seeds.len());
        for (i, &s) in seeds.iter().enumerate() {
            assert_eq!(all[i].to_bits(), estimate_for_seed(s, 100).to_bits());
        }
    }
}
