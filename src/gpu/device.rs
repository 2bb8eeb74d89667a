// gpu/device.rs — wgpu device abstraction.
//
// Responsibilities:
//   - Answer "is there a compute-capable GPU API here at all?" with a typed
//     `Capability`, before any device resource exists.
//   - Acquire a default-priority adapter and its device/queue.
//   - Hold the active `WorkgroupSize` and turn a lane count into a 1D
//     dispatch size, checked against the device's workgroup-count limit.
//   - Check buffer sizes against device limits so oversize requests surface
//     as `AllocationFailure` instead of a wgpu validation panic.
//
// CAPABILITY VS ACQUISITION:
// `probe_capability` enumerates adapters on the primary backends and keeps
// only those whose downlevel flags include COMPUTE_SHADERS. No adapters at
// all means the host has no usable API (CapabilityUnavailable). Adapters
// present but `request_adapter` / `request_device` failing is a different
// condition (DeviceAcquisitionFailure); the CLI reports them differently.
//
// ASYNC:
// wgpu's adapter/device API is async because on WebGPU it maps to JS
// Promises. Natively we just `pollster::block_on` it; this is one of the two
// points where the host thread suspends (the other is buffer mapping).

use std::fmt;

use crate::config::WORKGROUP_SIZE;
use crate::error::{EstimatorError, EstimatorResult};

/// Backends considered for both probing and acquisition.
const BACKENDS: wgpu::Backends = wgpu::Backends::PRIMARY;

/// Result of the startup capability query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// At least one adapter supports compute shaders.
    Available { adapters: usize },
    /// No compute-capable adapter on any primary backend.
    Unavailable,
}

impl Capability {
    pub fn is_available(&self) -> bool {
        matches!(self, Capability::Available { .. })
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capability::Available { adapters } => {
                write!(f, "available ({adapters} compute-capable adapter(s))")
            }
            Capability::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Lanes per workgroup for a 1D compute dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkgroupSize {
    pub x: u32,
}

impl Default for WorkgroupSize {
    fn default() -> Self {
        WorkgroupSize { x: WORKGROUP_SIZE }
    }
}

impl fmt::Display for WorkgroupSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} invocations", self.x)
    }
}

/// Cached adapter information for logging and the run report.
#[derive(Debug, Clone)]
pub struct AdapterInfo {
    pub name: String,
    pub device_type: wgpu::DeviceType,
    pub backend: wgpu::Backend,
}

impl fmt::Display for AdapterInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:?}, {:?})", self.name, self.backend, self.device_type)
    }
}

/// The GPU context: device, queue, adapter info and workgroup size.
///
/// # Field drop order
/// `_instance` is declared last so the `wgpu::Instance` outlives `device`
/// and `queue`. Some Vulkan layers crash if the instance is destroyed while
/// device-level objects still reference it.
pub struct GpuDevice {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub adapter_info: AdapterInfo,
    pub workgroup_size: WorkgroupSize,
    _instance: wgpu::Instance,
}

fn create_instance() -> wgpu::Instance {
    let flags = if cfg!(debug_assertions) {
        wgpu::InstanceFlags::VALIDATION
    } else {
        wgpu::InstanceFlags::empty()
    };
    wgpu::Instance::new(wgpu::InstanceDescriptor {
        backends: BACKENDS,
        flags,
        ..Default::default()
    })
}

fn supports_compute(adapter: &wgpu::Adapter) -> bool {
    adapter
        .get_downlevel_capabilities()
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
}

/// Query whether any compute-capable adapter exists. Creates no device.
pub fn probe_capability() -> Capability {
    let instance = create_instance();
    let adapters = instance.enumerate_adapters(BACKENDS);
    for a in &adapters {
        let info = a.get_info();
        log::debug!(
            "adapter: {} ({:?}, {:?}), compute: {}",
            info.name,
            info.backend,
            info.device_type,
            supports_compute(a)
        );
    }
    match adapters.iter().filter(|a| supports_compute(a)).count() {
        0 => Capability::Unavailable,
        n => Capability::Available { adapters: n },
    }
}

impl GpuDevice {
    /// Acquire the default-priority adapter and a device with the default
    /// workgroup size.
    ///
    /// # Errors
    /// `CapabilityUnavailable` if no compute-capable adapter exists,
    /// `DeviceAcquisitionFailure` if the adapter or device request fails.
    pub fn new() -> EstimatorResult<Self> {
        pollster::block_on(Self::init_async())
    }

    async fn init_async() -> EstimatorResult<Self> {
        let instance = create_instance();

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                force_fallback_adapter: false,
                compatible_surface: None,
            })
            .await
            .ok_or_else(|| EstimatorError::DeviceAcquisitionFailure {
                reason: "no adapter returned by request_adapter".into(),
                source: None,
            })?;

        if !supports_compute(&adapter) {
            return Err(EstimatorError::CapabilityUnavailable);
        }

        let raw_info = adapter.get_info();
        let adapter_info = AdapterInfo {
            name: raw_info.name.clone(),
            device_type: raw_info.device_type,
            backend: raw_info.backend,
        };
        log::info!("using adapter {adapter_info}");

        let limits = limits_for_adapter(&adapter.limits());

        let (device, queue): (wgpu::Device, wgpu::Queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("montecarlo-pi"),
                    required_features: wgpu::Features::empty(),
                    required_limits: limits,
                    memory_hints: wgpu::MemoryHints::default(),
                },
                None,
            )
            .await
            .map_err(|e| EstimatorError::DeviceAcquisitionFailure {
                reason: e.to_string(),
                source: Some(e),
            })?;

        Ok(GpuDevice {
            device,
            queue,
            adapter_info,
            workgroup_size: WorkgroupSize::default(),
            _instance: instance,
        })
    }

    /// Override the workgroup size, validating against the device limits.
    pub fn set_workgroup_size(&mut self, x: u32) -> EstimatorResult<()> {
        let limits = self.device.limits();
        let max = limits
            .max_compute_invocations_per_workgroup
            .min(limits.max_compute_workgroup_size_x);
        if x == 0 || x > max {
            return Err(EstimatorError::InvalidConfig(format!(
                "workgroup size {x} outside device range 1..={max}"
            )));
        }
        self.workgroup_size = WorkgroupSize { x };
        Ok(())
    }

    /// Number of workgroups needed to cover `lanes` with the active
    /// workgroup size.
    ///
    /// The shader must guard against the padding lanes:
    /// ```wgsl
    /// if gid.x >= num_seeds { return; }
    /// ```
    pub fn dispatch_size(&self, lanes: u32) -> EstimatorResult<u32> {
        let groups = workgroups_for(lanes, self.workgroup_size.x);
        let max = self.device.limits().max_compute_workgroups_per_dimension;
        if groups > max {
            return Err(EstimatorError::DispatchTooLarge { workgroups: groups, max });
        }
        Ok(groups)
    }

    /// Check that a storage buffer of `bytes` fits the device limits.
    pub fn check_storage_size(&self, label: &'static str, bytes: u64) -> EstimatorResult<()> {
        check_storage_size(&self.device.limits(), label, bytes)
    }
}

impl fmt::Display for GpuDevice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "GpuDevice {{ adapter: {}, workgroup: {} }}",
            self.adapter_info, self.workgroup_size
        )
    }
}

// ============================================================
// Limits helpers
// ============================================================

/// Ceiling division of `lanes` by `workgroup`.
pub fn workgroups_for(lanes: u32, workgroup: u32) -> u32 {
    lanes.div_ceil(workgroup)
}

/// Limits to request from an adapter offering `adapter`.
///
/// Starts from the downlevel tier (what any compute-capable adapter is
/// expected to meet), lifts the resolution and buffer-size limits to the
/// adapter's own, and never asks for more than the adapter reports.
fn limits_for_adapter(adapter: &wgpu::Limits) -> wgpu::Limits {
    let requested = wgpu::Limits {
        max_buffer_size: adapter.max_buffer_size,
        max_storage_buffer_binding_size: adapter.max_storage_buffer_binding_size,
        ..wgpu::Limits::downlevel_defaults().using_resolution(adapter.clone())
    };
    if requested.check_limits(adapter) {
        requested
    } else {
        log::debug!("adapter is below the downlevel tier; requesting its own limits");
        adapter.clone()
    }
}

fn check_storage_size(limits: &wgpu::Limits, label: &'static str, bytes: u64) -> EstimatorResult<()> {
    let max = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64);
    if bytes == 0 || bytes > max {
        return Err(EstimatorError::AllocationFailure {
            label,
            bytes,
            reason: format!("size must be in 1..={max} bytes"),
        });
    }
    Ok(())
}

// ============================================================
// Tests
// ============================================================
