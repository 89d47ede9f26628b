//! wgpu render pipelines.

pub mod dots;
pub mod overlay;
