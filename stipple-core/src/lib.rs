//! # stipple-core
//!
//! Density-relaxation stippling on the CPU: a fixed population of dots
//! drifts, frame by frame, until its local density matches an image.
//!
//! ## Architecture
//!
//! ```text
//!  ImageSampler (luma in [0, 1])
//!       │
//!       ▼
//!  Session::start(config)           ◀─── validate, allocate, scatter dots
//!       │
//!       ▼
//!  Session::step(dt)                ◀─── one frame:
//!       │                                 splat + inject
//!       │                                 blur-X → blur-Y (× decay)
//!       │                                 move along ∇((target − density)/ρ_ref)
//!       ▼
//!  Session::points() / density()    ◀─── read back for rendering
//! ```
//!
//! ## Crate modules
//!
//! - [`config`] — tunable parameters and their validation
//! - [`error`] — error types
//! - [`sampler`] — image loading and intensity sampling
//! - [`field`] — scalar grids, bilinear splat and sample
//! - [`blur`] — separable blur with decay
//! - [`points`] — the dot population
//! - [`relax`] — the per-frame pipeline stages
//! - [`session`] — lifecycle (start, step, reset, stop)
//! - [`metrics`] — distribution quality measures

pub mod config;
pub mod error;
pub mod sampler;
pub mod field;
pub mod blur;
pub mod points;
pub mod relax;
pub mod session;
pub mod metrics;

// Re-exports for convenience
pub use blur::BlurFilter;
pub use config::{StippleConfig, MAX_DOTS};
pub use error::{ConfigError, StippleError};
pub use field::{DensityField, Field};
pub use points::{upper_bound, Point, PointSet};
pub use relax::{StepParams, StepStats};
pub use sampler::ImageSampler;
pub use session::Session;
