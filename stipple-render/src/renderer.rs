//! High-level renderer that ties GPU context, pipelines, and stippling
//! state together into a single frame.
//!
//! The renderer only ever reads simulation state: CPU sessions are
//! uploaded with `write_buffer`, GPU stipplers are copied buffer-to-buffer
//! into the renderer's own instance and overlay buffers.

use stipple_core::{ImageSampler, Session, StippleConfig};
use thiserror::Error;
use wgpu::{
    Color, CommandEncoderDescriptor, LoadOp, Operations, RenderPassColorAttachment,
    RenderPassDescriptor, StoreOp, TextureViewDescriptor,
};

use crate::bridge;
use crate::compute::GpuStippler;
use crate::context::{GpuContext, GpuError};
use crate::pipelines::dots::DotPipeline;
use crate::pipelines::overlay::OverlayPipeline;
use crate::vertex::{CameraUniform, DotUniform, OverlayChannel};

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
    #[error("No surface configured (headless mode)")]
    NoSurface,
}

/// Frame statistics returned after each render.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Number of dots drawn.
    pub dot_count: u32,
    /// Number of draw calls.
    pub draw_calls: u32,
}

/// Which layers are drawn.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Overlays {
    /// The stippled image beneath everything.
    pub image: bool,
    /// Accumulated density, normalized by `ρ_ref`.
    pub density: bool,
    /// Show the diffused target in the density plane instead.
    pub target: bool,
    /// The dots themselves.
    pub points: bool,
}

impl Default for Overlays {
    fn default() -> Self {
        Self { image: false, density: false, target: false, points: true }
    }
}

/// Background and ink colors.
///
/// Dots gather where the stippled intensity is high.  Without inversion
/// that is the bright part of the image, so dots are light on a dark
/// background; with inversion they gather in the dark part and are drawn
/// dark on light.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    pub background: Color,
    pub ink: [f32; 4],
}

impl Palette {
    pub const LIGHT_ON_DARK: Self = Self {
        background: Color { r: 0.02, g: 0.02, b: 0.025, a: 1.0 },
        ink: [0.96, 0.96, 0.94, 1.0],
    };
    pub const DARK_ON_LIGHT: Self = Self {
        background: Color::WHITE,
        ink: [0.05, 0.05, 0.06, 1.0],
    };

    pub fn for_config(config: &StippleConfig) -> Self {
        if config.invert {
            Self::DARK_ON_LIGHT
        } else {
            Self::LIGHT_ON_DARK
        }
    }
}

/// Main renderer for one stippled image.
///
/// # Usage
///
/// ```ignore
/// let mut renderer = Renderer::new(&gpu, session.image())?;
/// renderer.prepare_session(&gpu, &session, &camera);
/// let stats = renderer.render_to_surface(&gpu)?;
/// ```
pub struct Renderer {
    dots: DotPipeline,
    overlay: OverlayPipeline,
    overlays: Overlays,
    palette: Palette,
    static_uploaded: bool,
}

impl Renderer {
    /// Create a renderer sized for `image` and upload its overlay plane.
    pub fn new(gpu: &GpuContext, image: &ImageSampler) -> Result<Self, GpuError> {
        let (width, height) = (image.width(), image.height());
        let cells = width as u64 * height as u64;
        gpu.check_storage_size("overlay plane", cells * std::mem::size_of::<[f32; 2]>() as u64)?;

        let dots = DotPipeline::new(&gpu.device, gpu.surface_format);
        let overlay = OverlayPipeline::new(&gpu.device, gpu.surface_format, width, height);
        overlay.upload_image(&gpu.queue, &bridge::image_plane(image));

        Ok(Self {
            dots,
            overlay,
            overlays: Overlays::default(),
            palette: Palette::LIGHT_ON_DARK,
            static_uploaded: false,
        })
    }

    pub fn overlays(&self) -> Overlays {
        self.overlays
    }

    pub fn overlays_mut(&mut self) -> &mut Overlays {
        &mut self.overlays
    }

    /// Colors used by the last prepare.
    pub fn palette(&self) -> Palette {
        self.palette
    }

    fn prepare_common(&mut self, gpu: &GpuContext, camera: &CameraUniform, config: &StippleConfig, reference: f32) {
        if !self.static_uploaded {
            self.dots.upload_quad(&gpu.queue);
            self.overlay.upload_static(&gpu.queue);
            self.static_uploaded = true;
        }
        self.palette = Palette::for_config(config);
        self.dots.upload_camera(&gpu.queue, camera);
        self.dots.upload_style(&gpu.queue, &DotUniform::new(config.dot_size, self.palette.ink));
        self.overlay.upload_camera(&gpu.queue, camera);
        self.overlay.set_image_tint(&gpu.queue, self.palette.ink);
        if self.overlays.density {
            let channel = if self.overlays.target { OverlayChannel::Secondary } else { OverlayChannel::Primary };
            self.overlay.set_density_display(&gpu.queue, bridge::density_overlay_scale(reference), channel);
        }
    }

    /// Upload a CPU session's points (and fields, when the density overlay
    /// is on) for the next render.
    pub fn prepare_session(&mut self, gpu: &GpuContext, session: &Session, camera: &CameraUniform) {
        self.prepare_common(gpu, camera, session.config(), session.reference_density());

        self.dots.upload_points(&gpu.queue, &bridge::collect_points(session.points()));
        if self.overlays.density {
            let values = bridge::interleave_fields(session.density(), session.target());
            self.overlay.upload_density(&gpu.queue, &values);
        }
    }

    /// Copy a GPU stippler's points (and fields, when the density overlay
    /// is on) for the next render.
    pub fn prepare_stippler(&mut self, gpu: &GpuContext, stippler: &GpuStippler, camera: &CameraUniform) {
        self.prepare_common(gpu, camera, stippler.config(), stippler.reference_density());

        let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("stipple_prepare_encoder"),
        });
        self.dots.copy_points(&mut encoder, stippler.points_buffer(), stippler.num_points());
        if self.overlays.density {
            self.overlay.copy_density(&mut encoder, stippler.fields_buffer());
        }
        gpu.queue.submit(std::iter::once(encoder.finish()));
    }

    /// Render to the window surface.  Returns frame statistics.
    pub fn render_to_surface(&self, gpu: &GpuContext) -> Result<FrameStats, RenderError> {
        let surface = gpu.surface.as_ref().ok_or(RenderError::NoSurface)?;
        let output = surface.get_current_texture()?;
        let view = output.texture.create_view(&TextureViewDescriptor::default());

        let stats = self.encode_frame(gpu, &view, "stipple_frame");
        output.present();
        Ok(stats)
    }

    /// Render to an off-screen texture (headless mode).
    pub fn render_to_texture(&self, gpu: &GpuContext, target_view: &wgpu::TextureView) -> FrameStats {
        self.encode_frame(gpu, target_view, "stipple_offscreen")
    }

    fn encode_frame(&self, gpu: &GpuContext, view: &wgpu::TextureView, label: &str) -> FrameStats {
        let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some(label),
        });

        let mut stats = FrameStats::default();
        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some(label),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(self.palette.background),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            stats.draw_calls += self.overlay.draw(&mut pass, self.overlays.image, self.overlays.density);
            if self.overlays.points && self.dots.instance_count() > 0 {
                self.dots.draw(&mut pass);
                stats.dot_count = self.dots.instance_count();
                stats.draw_calls += 1;
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        stats
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use stipple_core::StippleConfig;

    fn image() -> Arc<ImageSampler> {
        Arc::new(ImageSampler::from_luma(16, 8, (0..128).map(|k| (k % 16) as f32 / 15.0).collect()).unwrap())
    }

    fn offscreen(gpu: &GpuContext) -> wgpu::TextureView {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("test_target"),
            size: wgpu::Extent3d { width: 64, height: 32, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: gpu.surface_format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&TextureViewDescriptor::default())
    }

    #[test]
    fn test_overlays_default() {
        let overlays = Overlays::default();
        assert!(overlays.points);
        assert!(!overlays.image && !overlays.density && !overlays.target);
    }

    #[test]
    fn test_palette_follows_invert() {
        let plain = Palette::for_config(&StippleConfig::default());
        let inverted = Palette::for_config(&StippleConfig { invert: true, ..Default::default() });

        // Dots gather on bright pixels unless inverted, so they must be
        // brighter than the background; inverted, darker.
        let luma = |c: [f32; 4]| (c[0] + c[1] + c[2]) as f64;
        let bg = |c: Color| c.r + c.g + c.b;
        assert!(luma(plain.ink) > bg(plain.background));
        assert!(luma(inverted.ink) < bg(inverted.background));
        assert_eq!(inverted.background, Color::WHITE);
    }

    #[test]
    fn test_prepare_picks_palette_from_config() {
        let Ok(gpu) = pollster::block_on(GpuContext::new_headless()) else { return };
        let image = image();
        let camera = CameraUniform::fit_image(64.0, 32.0, 16.0, 8.0);
        let mut renderer = Renderer::new(&gpu, &image).unwrap();

        let session = Session::start(StippleConfig { num_dots: 10, seed: Some(3), ..Default::default() }, Arc::clone(&image)).unwrap();
        renderer.prepare_session(&gpu, &session, &camera);
        assert_eq!(renderer.palette(), Palette::LIGHT_ON_DARK);

        let inverted = StippleConfig { num_dots: 10, seed: Some(3), invert: true, ..Default::default() };
        let session = Session::start(inverted, Arc::clone(&image)).unwrap();
        renderer.prepare_session(&gpu, &session, &camera);
        assert_eq!(renderer.palette(), Palette::DARK_ON_LIGHT);
    }

    #[test]
    fn test_render_session_counts_draws() {
        let Ok(gpu) = pollster::block_on(GpuContext::new_headless()) else { return };
        let image = image();
        let session = Session::start(StippleConfig { num_dots: 50, seed: Some(1), ..Default::default() }, Arc::clone(&image)).unwrap();
        let mut renderer = Renderer::new(&gpu, &image).unwrap();
        let camera = CameraUniform::fit_image(64.0, 32.0, 16.0, 8.0);
        let view = offscreen(&gpu);

        renderer.prepare_session(&gpu, &session, &camera);
        assert_eq!(renderer.render_to_texture(&gpu, &view), FrameStats { dot_count: 50, draw_calls: 1 });

        *renderer.overlays_mut() = Overlays { image: true, density: true, target: true, points: false };
        renderer.prepare_session(&gpu, &session, &camera);
        assert_eq!(renderer.render_to_texture(&gpu, &view), FrameStats { dot_count: 0, draw_calls: 2 });
    }

    #[test]
    fn test_render_stippler_copies_points() {
        let Ok(gpu) = pollster::block_on(GpuContext::new_headless()) else { return };
        let image = image();
        let mut stippler = GpuStippler::new(&gpu, StippleConfig { num_dots: 80, seed: Some(2), ..Default::default() }, Arc::clone(&image)).unwrap();
        stippler.step(&gpu, 1.0 / 60.0);

        let mut renderer = Renderer::new(&gpu, &image).unwrap();
        renderer.overlays_mut().density = true;
        let camera = CameraUniform::fit_image(64.0, 32.0, 16.0, 8.0);
        renderer.prepare_stippler(&gpu, &stippler, &camera);

        let stats = renderer.render_to_texture(&gpu, &offscreen(&gpu));
        assert_eq!(stats, FrameStats { dot_count: 80, draw_calls: 2 });
    }

    #[test]
    fn test_render_to_surface_headless_fails() {
        let Ok(gpu) = pollster::block_on(GpuContext::new_headless()) else { return };
        let renderer = Renderer::new(&gpu, &image()).unwrap();
        assert!(matches!(renderer.render_to_surface(&gpu), Err(RenderError::NoSurface)));
    }
}
