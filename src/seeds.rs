// seeds.rs — host-side seed generation.
//
// Seeds are drawn uniformly from [0, 2^31 − 1), i.e. every non-negative i32
// except i32::MAX. They are stored as i32 because that is the element type of
// the kernel's seed array.

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Exclusive upper bound of the seed range (2^31 − 1).
pub const SEED_UPPER_BOUND: i32 = i32::MAX;

/// Generate `n` seeds from the thread-local RNG.
pub fn generate_seeds(n: usize) -> Vec<i32> {
    generate_seeds_with(&mut rand::thread_rng(), n)
}

/// Generate `n` seeds from a caller-supplied RNG.
///
/// Seed `i` of the result is the `i`-th draw, so the same RNG state always
/// yields the same buffer.
pub fn generate_seeds_with<R: Rng + ?Sized>(rng: &mut R, n: usize) -> Vec<i32> {
    let dist = Uniform::new(0i32, SEED_UPPER_BOUND);
    (0..n).map(|_| dist.sample(rng)).collect()
}

/// Generate `n` seeds, reproducibly when `rng_seed` is set.
pub fn generate_seeds_for(n: usize, rng_seed: Option<u64>) -> Vec<i32> {
    match rng_seed {
        Some(s) => generate_seeds_with(&mut StdRng::seed_from_u64(s), n),
        None => generate_seeds(n),
    }
}
