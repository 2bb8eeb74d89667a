// montecarlo-pi: Monte Carlo estimate of pi on a wgpu compute shader.
//
// Each of N host-generated seeds drives an independent PCG stream on its own
// GPU lane; the lane averages the height of the unit quarter circle over K
// draws and writes one estimate. The host reads the N estimates back and
// averages them.
//
// `pcg` is the CPU reference for the kernel; `gpu` holds the wgpu layer;
// `pipeline` ties seed generation, dispatch, readback and aggregation into
// one timed run.

pub mod aggregate;
pub mod config;
pub mod error;
pub mod gpu;
pub mod pcg;
pub mod pipeline;
pub mod report;
pub mod seeds;

pub use aggregate::{aggregate, AggregateResult};
pub use config::EstimatorConfig;
pub use error::{EstimatorError, EstimatorResult};
pub use pipeline::{run, Backend};
pub use report::RunReport;
