// pipeline.rs — the timed end-to-end run.
//
//   generate seeds → upload → dispatch → copy → map → aggregate → report
//
// Strictly sequential on the calling thread. The elapsed time covers the
// whole sequence, including the capability probe and device acquisition on
// the GPU backend, and is returned in the `RunReport` rather than kept in
// any global.
//
// The CPU backend runs the same seeds through the reference kernel in
// `pcg`. It exists for benchmarking and for hosts without a GPU.

use std::fmt;
use std::time::Instant;

use crate::aggregate::aggregate;
use crate::config::EstimatorConfig;
use crate::error::{EstimatorError, EstimatorResult};
use crate::gpu::device::{probe_capability, GpuDevice};
use crate::gpu::estimator::GpuPiEstimator;
use crate::pcg::estimate_all;
use crate::report::RunReport;
use crate::seeds::generate_seeds_for;

/// Where the per-seed kernel runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    #[default]
    Gpu,
    Cpu,
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Gpu => write!(f, "gpu"),
            Backend::Cpu => write!(f, "cpu"),
        }
    }
}

/// Run one complete estimate on `backend`.
pub fn run(config: &EstimatorConfig, backend: Backend) -> EstimatorResult<RunReport> {
    config.validate()?;
    log::info!(
        "estimating pi on {backend}: {} seeds × {} iterations",
        config.num_seeds,
        config.iterations
    );
    match backend {
        Backend::Gpu => run_gpu(config),
        Backend::Cpu => run_cpu(config),
    }
}

fn run_gpu(config: &EstimatorConfig) -> EstimatorResult<RunReport> {
    let start = Instant::now();

    let capability = probe_capability();
    log::debug!("GPU capability: {capability}");
    if !capability.is_available() {
        return Err(EstimatorError::CapabilityUnavailable);
    }

    let mut gpu = GpuDevice::new()?;
    if gpu.workgroup_size.x != config.workgroup_size {
        gpu.set_workgroup_size(config.workgroup_size)?;
    }
    let estimator = GpuPiEstimator::new(&gpu, config.iterations)?;

    let seeds = generate_seeds_for(config.num_seeds, config.rng_seed);
    let estimates = estimator.dispatch_kernel(&gpu, &seeds)?.read_back(&gpu)?;
    let result = aggregate(&estimates)?;

    let elapsed = start.elapsed();
    log::debug!("gpu run finished in {elapsed:?}");
    Ok(RunReport {
        estimate: result.mean,
        elapsed,
        num_seeds: result.count,
        total_samples: config.total_samples(),
        backend: format!("gpu: {}", gpu.adapter_info.name),
    })
}

fn run_cpu(config: &EstimatorConfig) -> EstimatorResult<RunReport> {
    let start = Instant::now();

    let seeds = generate_seeds_for(config.num_seeds, config.rng_seed);
    let estimates = estimate_all(&seeds, config.iterations);
    let result = aggregate(&estimates)?;

    let elapsed = start.elapsed();
    log::debug!("cpu run finished in {elapsed:?}");
    Ok(RunReport {
        estimate: result.mean,
        elapsed,
        num_seeds: result.count,
        total_samples: config.total_samples(),
        backend: Backend::Cpu.to_string(),
    })
}
