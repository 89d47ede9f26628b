//! # stipple-render
//!
//! GPU backend for stippling, built on `wgpu`: a compute stippler that
//! runs the relaxation on the device, and a renderer that draws dots and
//! debug overlays from either backend.
//!
//! ## Architecture
//!
//! ```text
//!  Session (stipple-core)            GpuStippler.step()
//!       │                                  │  write_density → blur_x
//!       │                                  │  → blur_y → move_particles
//!       ▼                                  ▼
//!  bridge::collect_points()          points / fields buffers
//!       │                                  │
//!       ▼                                  ▼
//!  Renderer.prepare_session()        Renderer.prepare_stippler()
//!       │        (write_buffer)            │   (buffer-to-buffer copy)
//!       └──────────────┬───────────────────┘
//!                      ▼
//!  Renderer.render_to_surface()      ◀─── overlays + one instanced draw
//! ```
//!
//! ## Crate modules
//!
//! - [`context`] — GPU device/queue/surface initialisation, limit checks
//! - [`vertex`] — vertex, instance, and uniform data types
//! - [`compute`] — the compute-shader stippler
//! - [`pipelines`] — wgpu render pipelines (dots, overlays)
//! - [`renderer`] — high-level frame orchestration
//! - [`bridge`] — core state → GPU data conversion

pub mod context;
pub mod vertex;
pub mod compute;
pub mod pipelines;
pub mod renderer;
pub mod bridge;

// Re-exports for convenience
pub use context::{GpuContext, GpuError};
pub use vertex::{CameraUniform, ComputeParams, DotUniform, GpuPoint, OverlayChannel};
pub use compute::GpuStippler;
pub use renderer::{FrameStats, Overlays, RenderError, Renderer};
pub use bridge::{collect_points, compute_params};
