// gpu/mod.rs — wgpu compute layer.
//
// `device` answers the capability question and owns the adapter, device and
// queue. `estimator` compiles the Monte Carlo π shader and runs it.
//
// The CPU reference in `crate::pcg` stays authoritative: every GPU result is
// validated against it within a small floating-point tolerance.

pub mod device;
pub mod estimator;
