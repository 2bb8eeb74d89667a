// config.rs — run configuration and its defaults.
//
// The defaults reproduce the reference run: one million seeds, ten thousand
// PCG draws per seed, workgroups of 256 lanes. All of them can be overridden
// at startup from the command line; nothing is reconfigured mid-run.

use crate::error::{EstimatorError, EstimatorResult};

/// Number of seeds (and therefore GPU lanes that do work) per run.
pub const NUM_SEEDS: usize = 1_000_000;

/// PCG draws per seed inside the kernel.
pub const INNER_ITERATIONS: u32 = 10_000;

/// Lanes per workgroup for the 1D dispatch.
pub const WORKGROUP_SIZE: u32 = 256;

/// Inclusive upper bound on the workgroup size. Matches wgpu's default
/// `max_compute_invocations_per_workgroup`.
pub const MAX_WORKGROUP_SIZE: u32 = 256;

/// Everything a single estimator run needs to know up front.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EstimatorConfig {
    /// Seed count N. Must be > 0 and fit in a `u32` (the size descriptor).
    pub num_seeds: usize,
    /// Kernel inner-loop iteration count.
    pub iterations: u32,
    /// Lanes per workgroup.
    pub workgroup_size: u32,
    /// Seed for the host RNG. `None` draws from the thread RNG.
    pub rng_seed: Option<u64>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            num_seeds: NUM_SEEDS,
            iterations: INNER_ITERATIONS,
            workgroup_size: WORKGROUP_SIZE,
            rng_seed: None,
        }
    }
}

impl EstimatorConfig {
    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> EstimatorResult<()> {
        if self.num_seeds == 0 {
            return Err(EstimatorError::InvalidConfig("num_seeds must be > 0".into()));
        }
        if u32::try_from(self.num_seeds).is_err() {
            return Err(EstimatorError::InvalidConfig(format!(
                "num_seeds {} does not fit in a u32 size descriptor",
                self.num_seeds
            )));
        }
        if self.iterations == 0 {
            return Err(EstimatorError::InvalidConfig("iterations must be > 0".into()));
        }
        if self.workgroup_size == 0 || self.workgroup_size > MAX_WORKGROUP_SIZE {
            return Err(EstimatorError::InvalidConfig(format!(
                "workgroup_size must be in 1..={MAX_WORKGROUP_SIZE} (got {})",
                self.workgroup_size
            )));
        }
        Ok(())
    }

    /// Total PCG samples drawn across all seeds.
    pub fn total_samples(&self) -> u64 {
        self.num_seeds as u64 * self.iterations as u64
    }
}
