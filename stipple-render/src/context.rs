//! GPU context — owns `wgpu::Device`, `Queue`, and optional `Surface`.
//!
//! Two construction paths:
//!
//! 1. **Headless** (`GpuContext::new_headless`) — no window, no surface.
//!    Used for compute-only stippling, tests, and benchmarks.
//!
//! 2. **Windowed** (`GpuContext::new_with_surface`) — requires a
//!    `raw_window_handle`-compatible window.  Used by `stipple-desktop`.

use stipple_core::{ConfigError, StippleError};
use thiserror::Error;
use wgpu::{
    Adapter, Device, DeviceDescriptor, Instance, InstanceDescriptor, Queue,
    RequestAdapterOptions, Surface, SurfaceConfiguration, TextureFormat,
    TextureUsages,
};

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("No suitable GPU adapter found")]
    NoAdapter,
    #[error("Failed to request device: {0}")]
    RequestDevice(#[from] wgpu::RequestDeviceError),
    #[error("Surface error: {0}")]
    Surface(String),
    #[error("{what} needs {bytes} bytes, device limit is {limit}")]
    ResourceExhausted {
        what: &'static str,
        bytes: u64,
        limit: u64,
    },
    #[error("Buffer readback failed: {0}")]
    Map(#[from] wgpu::BufferAsyncError),
    #[error("Buffer readback was dropped before completing")]
    ReadbackLost,
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Core(#[from] StippleError),
}

/// Core GPU state shared by the compute stippler and the renderer.
pub struct GpuContext {
    pub device: Device,
    pub queue: Queue,
    pub adapter: Adapter,
    /// Present only when rendering to a window.
    pub surface: Option<Surface<'static>>,
    pub surface_config: Option<SurfaceConfiguration>,
    pub surface_format: TextureFormat,
}

impl GpuContext {
    /// Create a headless context (no window, no surface).
    pub async fn new_headless() -> Result<Self, GpuError> {
        let instance = Instance::new(&InstanceDescriptor::default());

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("stipple-headless"),
                ..Default::default()
            }, None)
            .await?;

        log::debug!("Headless adapter: {:?}", adapter.get_info().name);

        Ok(Self {
            device,
            queue,
            adapter,
            surface: None,
            surface_config: None,
            // Bgra8UnormSrgb is the most universally supported format.
            surface_format: TextureFormat::Bgra8UnormSrgb,
        })
    }

    /// Create a context with a surface attached to `window`.
    ///
    /// The window handles must remain valid for the lifetime of the
    /// returned context.
    pub async fn new_with_surface<W>(window: W, width: u32, height: u32) -> Result<Self, GpuError>
    where
        W: wgpu::WasmNotSendSync + Into<wgpu::SurfaceTarget<'static>>,
    {
        let instance = Instance::new(&InstanceDescriptor::default());

        let surface = instance
            .create_surface(window)
            .map_err(|e| GpuError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or(GpuError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(&DeviceDescriptor {
                label: Some("stipple-windowed"),
                ..Default::default()
            }, None)
            .await?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| caps.formats.first())
            .copied()
            .ok_or_else(|| GpuError::Surface("surface reports no formats".into()))?;
        let alpha_mode = caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let config = SurfaceConfiguration {
            usage: TextureUsages::RENDER_ATTACHMENT,
            format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::Fifo, // VSync
            desired_maximum_frame_latency: 2,
            alpha_mode,
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        log::info!("GPU adapter: {:?} ({:?})", adapter.get_info().name, format);

        Ok(Self {
            device,
            queue,
            adapter,
            surface: Some(surface),
            surface_config: Some(config),
            surface_format: format,
        })
    }

    /// Resize the surface.  No-op if headless.
    pub fn resize(&mut self, width: u32, height: u32) {
        if let Some(config) = &mut self.surface_config {
            if width == 0 || height == 0 {
                return;
            }
            config.width = width;
            config.height = height;
            if let Some(surface) = &self.surface {
                surface.configure(&self.device, config);
            }
        }
    }

    /// Current surface dimensions, or `(0, 0)` if headless.
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface_config
            .as_ref()
            .map(|c| (c.width, c.height))
            .unwrap_or((0, 0))
    }

    /// Fail with `ResourceExhausted` if a storage buffer of `bytes` would
    /// exceed the device's binding or buffer size limits.
    pub fn check_storage_size(&self, what: &'static str, bytes: u64) -> Result<(), GpuError> {
        check_storage_size(&self.device.limits(), what, bytes)
    }
}

pub(crate) fn check_storage_size(
    limits: &wgpu::Limits,
    what: &'static str,
    bytes: u64,
) -> Result<(), GpuError> {
    let limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
    if bytes > limit {
        return Err(GpuError::ResourceExhausted { what, bytes, limit });
    }
    Ok(())
}

// ===================================================================
// Tests
// ===================================================================
