//! GPU context initialization.
//!
//! This module provides a thin wrapper around wgpu's instance, adapter,
//! device and queue objects, plus the binding layouts shared by every
//! program and buffer in the crate.  The `new_blocking` constructor
//! hides the asynchronous nature of requesting an adapter and device by
//! using the [`pollster`] crate.

use log::{debug, info, warn};
use wgpu::{Adapter, Device, Instance, Queue};

use crate::error::{Error, Result};
use crate::views::ViewLayouts;

/// A GPU context encapsulates all state needed to submit compute work.
///
/// The context holds on to the `Instance`, `Adapter`, `Device` and
/// `Queue`.  Those types have internal reference counting so they can
/// cheaply be cloned if you need multiple references.  A discrete
/// adapter is preferred; when none is found the default adapter is
/// requested instead, and as a last resort the fallback (software)
/// adapter.
pub struct GpuContext {
    /// The global GPU instance.
    pub instance: Instance,
    /// The physical device selected for computation.
    pub adapter: Adapter,
    /// Logical device used to create resources and command encoders.
    pub device: Device,
    /// Command submission queue used to send recorded command buffers
    /// to the GPU.
    pub queue: Queue,
    /// Read, write and params layouts every view is created against.
    pub views: ViewLayouts,
}

fn supports_compute(adapter: &Adapter) -> bool {
    adapter
        .get_downlevel_capabilities()
        .flags
        .contains(wgpu::DownlevelFlags::COMPUTE_SHADERS)
}

/// Picks the first discrete adapter that can run compute shaders.
///
/// `Ok(None)` means enumeration worked but found nothing suitable.
fn enumerate_discrete(instance: &Instance) -> Result<Option<Adapter>> {
    if Instance::enabled_backend_features().is_empty() {
        return Err(Error::AdapterEnumeration(
            "no graphics backend is compiled in or enabled".into(),
        ));
    }
    let adapters = instance.enumerate_adapters(wgpu::Backends::all());
    for adapter in &adapters {
        let info = adapter.get_info();
        debug!(
            "found adapter {:?} ({:?}, {:?})",
            info.name, info.device_type, info.backend
        );
    }
    Ok(adapters.into_iter().find(|adapter| {
        adapter.get_info().device_type == wgpu::DeviceType::DiscreteGpu && supports_compute(adapter)
    }))
}

async fn select_adapter(instance: &Instance) -> Result<Adapter> {
    if let Some(adapter) = enumerate_discrete(instance)? {
        return Ok(adapter);
    }
    info!("no discrete adapter found, requesting the default adapter");
    let default = instance
        .request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        })
        .await;
    match default {
        Ok(adapter) => Ok(adapter),
        Err(e) => {
            warn!("default adapter unavailable ({e}), trying the fallback adapter");
            instance
                .request_adapter(&wgpu::RequestAdapterOptions {
                    power_preference: wgpu::PowerPreference::None,
                    force_fallback_adapter: true,
                    compatible_surface: None,
                })
                .await
                .map_err(|e| Error::DeviceInit(format!("unable to find a GPU adapter: {e}")))
        }
    }
}

impl GpuContext {
    /// Create a new GPU context synchronously.
    ///
    /// This function will block the current thread while waiting for
    /// the asynchronous adapter and device requests to finish.
    pub fn new_blocking() -> Result<Self> {
        pollster::block_on(Self::new_async())
    }

    /// Create a new GPU context asynchronously.
    pub async fn new_async() -> Result<Self> {
        let instance = Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = select_adapter(&instance).await?;
        // Downlevel devices may not support compute on all backends;
        // abort early if unsupported.
        if !supports_compute(&adapter) {
            return Err(Error::DeviceInit(
                "selected adapter does not support compute shaders".into(),
            ));
        }
        let info = adapter.get_info();
        info!(
            "using adapter {:?} ({:?}, {:?})",
            info.name, info.device_type, info.backend
        );
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("pingpong_device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_defaults(),
                memory_hints: wgpu::MemoryHints::MemoryUsage,
                trace: wgpu::Trace::Off,
            })
            .await
            .map_err(|e| Error::DeviceInit(format!("failed to create GPU device: {e}")))?;
        let views = ViewLayouts::new(&device);
        Ok(Self {
            instance,
            adapter,
            device,
            queue,
            views,
        })
    }

    /// Runs `f` inside validation and out-of-memory error scopes.
    ///
    /// Returns the value produced by `f` together with the first error the
    /// device reported while it ran.
    pub fn capture_errors<T>(&self, f: impl FnOnce(&Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        let value = f(&self.device);
        let oom = pollster::block_on(self.device.pop_error_scope());
        let validation = pollster::block_on(self.device.pop_error_scope());
        (value, oom.or(validation))
    }
}
