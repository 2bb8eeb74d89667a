// error.rs — failure taxonomy for the estimator pipeline.
//
// Every variant is terminal. Nothing in the pipeline retries or degrades
// (e.g. by shrinking the seed count); the caller reports one line and stops.

use thiserror::Error;

/// Errors from configuration, device setup, dispatch and aggregation.
#[derive(Debug, Error)]
pub enum EstimatorError {
    /// The host has no compute-capable graphics API or no adapter at all.
    #[error("no compute-capable GPU API is available on this host")]
    CapabilityUnavailable,

    /// An adapter or device could not be obtained.
    #[error("failed to acquire a GPU device: {reason}")]
    DeviceAcquisitionFailure {
        reason: String,
        #[source]
        source: Option<wgpu::RequestDeviceError>,
    },

    /// A buffer could not be created at the requested byte size.
    #[error("failed to allocate {label} buffer of {bytes} bytes: {reason}")]
    AllocationFailure {
        label: &'static str,
        bytes: u64,
        reason: String,
    },

    /// Too many workgroups for a single 1D dispatch.
    #[error("dispatch of {workgroups} workgroups exceeds device limit of {max}")]
    DispatchTooLarge { workgroups: u32, max: u32 },

    /// The WGSL module or compute pipeline failed validation.
    #[error("shader compilation failed: {0}")]
    ShaderCompilation(String),

    /// Mapping the readback buffer failed.
    #[error("estimate readback failed: {0}")]
    Readback(#[from] wgpu::BufferAsyncError),

    /// A configuration value is out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `aggregate` was handed an empty sequence.
    #[error("cannot aggregate an empty estimate sequence")]
    EmptyEstimates,
}

/// Convenience alias for `Result<T, EstimatorError>`.
pub type EstimatorResult<T> = Result<T, EstimatorError>;
