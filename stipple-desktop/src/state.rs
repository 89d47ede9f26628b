//! Application state — owns the stippling backend, renderer and camera.
//!
//! `AppState` is the single source of truth for the running application.
//! The backend is either a CPU [`Session`] or a [`GpuStippler`]; both are
//! started from the same config and image, so switching between them
//! restarts the relaxation from an identical seeded distribution.

use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use stipple_core::{ImageSampler, Session, StepStats, StippleConfig};
use stipple_render::compute::GpuStippler;
use stipple_render::context::{GpuContext, GpuError};
use stipple_render::renderer::{FrameStats, RenderError, Renderer};
use stipple_render::vertex::CameraUniform;

/// Frame time used before the first tick.
const FIRST_DT: f32 = 1.0 / 60.0;
/// Longest frame time fed to a step; stalls do not turn into jumps.
const MAX_DT: f32 = 0.1;

/// Which device runs the relaxation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    Cpu,
    Gpu,
}

impl BackendKind {
    pub fn other(self) -> Self {
        match self {
            Self::Cpu => Self::Gpu,
            Self::Gpu => Self::Cpu,
        }
    }
}

/// A running stippler on either device.
pub enum Backend {
    Cpu(Session),
    Gpu(GpuStippler),
}

impl Backend {
    fn start(
        gpu: &GpuContext,
        kind: BackendKind,
        config: StippleConfig,
        image: Arc<ImageSampler>,
    ) -> Result<Self, GpuError> {
        Ok(match kind {
            BackendKind::Cpu => Self::Cpu(Session::start(config, image)?),
            BackendKind::Gpu => Self::Gpu(GpuStippler::new(gpu, config, image)?),
        })
    }

    pub fn kind(&self) -> BackendKind {
        match self {
            Self::Cpu(_) => BackendKind::Cpu,
            Self::Gpu(_) => BackendKind::Gpu,
        }
    }

    pub fn frame(&self) -> u64 {
        match self {
            Self::Cpu(session) => session.frame(),
            Self::Gpu(stippler) => stippler.frame(),
        }
    }

    pub fn image(&self) -> &ImageSampler {
        match self {
            Self::Cpu(session) => session.image(),
            Self::Gpu(stippler) => stippler.image(),
        }
    }

    fn stop(self) {
        match self {
            Self::Cpu(session) => session.stop(),
            Self::Gpu(stippler) => stippler.stop(),
        }
    }
}

/// Camera state — fits the image to the viewport, then tracks pan and zoom.
#[derive(Debug, Clone)]
pub struct Camera {
    pub pan_x: f32,
    pub pan_y: f32,
    pub zoom: f32,
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub image_width: f32,
    pub image_height: f32,
}

impl Camera {
    pub fn new(width: f32, height: f32, image_width: u32, image_height: u32) -> Self {
        let mut camera = Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
            viewport_width: width,
            viewport_height: height,
            image_width: image_width as f32,
            image_height: image_height as f32,
        };
        camera.fit();
        camera
    }

    /// Zoom that shows the whole image.
    pub fn fit_zoom(&self) -> f32 {
        (self.viewport_width / self.image_width)
            .min(self.viewport_height / self.image_height)
            .max(f32::MIN_POSITIVE)
    }

    /// Center the whole image in the viewport.
    pub fn fit(&mut self) {
        self.zoom = self.fit_zoom();
        self.pan_x = 0.5 * (self.image_width - self.viewport_width / self.zoom);
        self.pan_y = 0.5 * (self.image_height - self.viewport_height / self.zoom);
    }

    /// Convert screen pixel coordinates to image coordinates.
    pub fn screen_to_image(&self, screen_x: f32, screen_y: f32) -> (f32, f32) {
        (screen_x / self.zoom + self.pan_x, screen_y / self.zoom + self.pan_y)
    }

    pub fn uniform(&self) -> CameraUniform {
        CameraUniform::orthographic(
            self.viewport_width,
            self.viewport_height,
            self.pan_x,
            self.pan_y,
            self.zoom,
        )
    }

    /// Pan by delta pixels (in screen space).
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan_x -= dx / self.zoom;
        self.pan_y -= dy / self.zoom;
    }

    /// Zoom toward/away from screen point (sx, sy), between half and 32×
    /// the fitted zoom.
    pub fn zoom_at(&mut self, sx: f32, sy: f32, factor: f32) {
        let (wx, wy) = self.screen_to_image(sx, sy);

        let fit = self.fit_zoom();
        self.zoom = (self.zoom * factor).clamp(0.5 * fit, 32.0 * fit);

        self.pan_x = wx - sx / self.zoom;
        self.pan_y = wy - sy / self.zoom;
    }

    /// Update viewport dimensions and refit.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.viewport_width = width;
        self.viewport_height = height;
        self.fit();
    }
}

/// Owns the entire application pipeline.
pub struct AppState {
    pub gpu: GpuContext,
    pub renderer: Renderer,
    pub camera: Camera,
    backend: Backend,
    config: StippleConfig,
    source: Arc<ImageSampler>,
    last_tick: Option<Instant>,
    last_step: Option<StepStats>,
}

impl AppState {
    /// Start a `kind` backend on `source` and size the camera to the window.
    pub fn new(
        gpu: GpuContext,
        width: u32,
        height: u32,
        config: StippleConfig,
        source: Arc<ImageSampler>,
        kind: BackendKind,
    ) -> Result<Self, GpuError> {
        let backend = Backend::start(&gpu, kind, config.clone(), Arc::clone(&source))?;
        let mut renderer = Renderer::new(&gpu, backend.image())?;
        renderer.overlays_mut().points = config.render_points;
        let camera = Camera::new(width as f32, height as f32, source.width(), source.height());

        info!("Started {:?} backend with {} dots", kind, config.num_dots);

        Ok(Self {
            gpu,
            renderer,
            camera,
            backend,
            config,
            source,
            last_tick: None,
            last_step: None,
        })
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn config(&self) -> &StippleConfig {
        &self.config
    }

    /// Stats of the last CPU step; the GPU backend reports none.
    pub fn last_step(&self) -> Option<StepStats> {
        self.last_step
    }

    /// Seconds since the previous tick, capped at `MAX_DT`.
    fn tick(&mut self) -> f32 {
        let now = Instant::now();
        let dt = self
            .last_tick
            .map(|t| now.duration_since(t).as_secs_f32())
            .unwrap_or(FIRST_DT);
        self.last_tick = Some(now);
        dt.min(MAX_DT)
    }

    /// Run one relaxation frame of `dt` seconds.
    pub fn advance(&mut self, dt: f32) {
        self.last_step = match &mut self.backend {
            Backend::Cpu(session) => Some(session.step(dt)),
            Backend::Gpu(stippler) => {
                stippler.step(&self.gpu, dt);
                None
            }
        };
    }

    /// Upload the current backend state to the renderer.
    pub fn prepare(&mut self) {
        let camera = self.camera.uniform();
        match &self.backend {
            Backend::Cpu(session) => self.renderer.prepare_session(&self.gpu, session, &camera),
            Backend::Gpu(stippler) => self.renderer.prepare_stippler(&self.gpu, stippler, &camera),
        }
    }

    /// Step, prepare and present one frame.
    pub fn render_frame(&mut self) -> Result<FrameStats, RenderError> {
        let dt = self.tick();
        self.advance(dt);
        self.prepare();
        self.renderer.render_to_surface(&self.gpu)
    }

    /// Re-seed the points and clear the fields.
    pub fn reset(&mut self) -> Result<(), GpuError> {
        match &mut self.backend {
            Backend::Cpu(session) => session.reset()?,
            Backend::Gpu(stippler) => stippler.reset(&self.gpu)?,
        }
        self.last_tick = None;
        self.last_step = None;
        info!("Reset {:?} backend", self.backend.kind());
        Ok(())
    }

    /// Restart on the other device.  The current backend keeps running if
    /// the new one fails to start.
    pub fn switch_backend(&mut self) -> Result<BackendKind, GpuError> {
        let kind = self.backend.kind().other();
        let next = Backend::start(&self.gpu, kind, self.config.clone(), Arc::clone(&self.source))?;
        let previous = std::mem::replace(&mut self.backend, next);
        debug!("Stopping {:?} backend at frame {}", previous.kind(), previous.frame());
        previous.stop();

        self.last_tick = None;
        self.last_step = None;
        info!("Switched to {:?} backend", kind);
        Ok(kind)
    }

    /// Handle a character key.  Returns `true` if it changed anything.
    pub fn handle_key(&mut self, key: &str) -> bool {
        match key.to_ascii_lowercase().as_str() {
            "z" => {
                let overlays = self.renderer.overlays_mut();
                overlays.image = !overlays.image;
            }
            "x" => {
                let overlays = self.renderer.overlays_mut();
                overlays.density = !overlays.density;
            }
            "t" => {
                let overlays = self.renderer.overlays_mut();
                overlays.target = !overlays.target;
            }
            "p" => {
                let overlays = self.renderer.overlays_mut();
                overlays.points = !overlays.points;
            }
            "c" => {
                if let Err(e) = self.switch_backend() {
                    warn!("Backend switch failed: {e}");
                    return false;
                }
            }
            _ => return false,
        }
        debug!("Overlays: {:?}", self.renderer.overlays());
        true
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.gpu.resize(width, height);
        self.camera.resize(width as f32, height as f32);
    }

    /// Pan the camera by screen-space delta.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.camera.pan(dx, dy);
    }

    /// Zoom toward screen point.
    pub fn zoom_at(&mut self, screen_x: f32, screen_y: f32, delta: f32) {
        let factor = if delta > 0.0 { 1.1 } else { 1.0 / 1.1 };
        self.camera.zoom_at(screen_x, screen_y, factor);
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn image() -> Arc<ImageSampler> {
        let data = (0..64).map(|k| if k % 8 < 4 { 1.0 } else { 0.1 }).collect();
        Arc::new(ImageSampler::from_luma(8, 8, data).unwrap())
    }

    fn config() -> StippleConfig {
        StippleConfig { num_dots: 40, seed: Some(9), ..Default::default() }
    }

    fn headless_state(kind: BackendKind) -> Option<AppState> {
        let gpu = pollster::block_on(GpuContext::new_headless()).ok()?;
        Some(AppState::new(gpu, 800, 600, config(), image(), kind).unwrap())
    }

    #[test]
    fn test_camera_fits_image() {
        let cam = Camera::new(800.0, 600.0, 200, 100);
        assert!((cam.zoom - 4.0).abs() < 1e-6);
        let uniform = cam.uniform();
        for (x, y) in [(0.0, 0.0), (200.0, 0.0), (0.0, 100.0), (200.0, 100.0)] {
            let [nx, ny] = uniform.project(x, y);
            assert!(nx.abs() <= 1.0 + 1e-5 && ny.abs() <= 1.0 + 1e-5);
        }
        let (cx, cy) = cam.screen_to_image(400.0, 300.0);
        assert!((cx - 100.0).abs() < 1e-4);
        assert!((cy - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_camera_zoom_keeps_point_under_cursor() {
        let mut cam = Camera::new(800.0, 600.0, 200, 100);
        let before = cam.screen_to_image(300.0, 200.0);
        cam.zoom_at(300.0, 200.0, 1.1);
        let after = cam.screen_to_image(300.0, 200.0);
        assert!((before.0 - after.0).abs() < 1e-3);
        assert!((before.1 - after.1).abs() < 1e-3);
    }

    #[test]
    fn test_camera_zoom_clamp() {
        let mut cam = Camera::new(800.0, 600.0, 200, 100);
        let fit = cam.fit_zoom();
        for _ in 0..200 {
            cam.zoom_at(400.0, 300.0, 1.1);
        }
        assert!(cam.zoom <= 32.0 * fit + 1e-3);
        for _ in 0..400 {
            cam.zoom_at(400.0, 300.0, 1.0 / 1.1);
        }
        assert!(cam.zoom >= 0.5 * fit - 1e-6);
    }

    #[test]
    fn test_camera_resize_refits() {
        let mut cam = Camera::new(800.0, 600.0, 200, 100);
        cam.pan(50.0, 10.0);
        cam.resize(400.0, 400.0);
        assert!((cam.zoom - 2.0).abs() < 1e-6);
        assert!(cam.pan_x.abs() < 1e-4);
    }

    #[test]
    fn test_backend_kind_other() {
        assert_eq!(BackendKind::Cpu.other(), BackendKind::Gpu);
        assert_eq!(BackendKind::Gpu.other(), BackendKind::Cpu);
    }

    #[test]
    fn test_overlay_keys_toggle() {
        let Some(mut app) = headless_state(BackendKind::Cpu) else { return };
        assert!(app.renderer.overlays().points);

        assert!(app.handle_key("z"));
        assert!(app.handle_key("X"));
        assert!(app.handle_key("t"));
        assert!(app.handle_key("p"));
        let overlays = app.renderer.overlays();
        assert!(overlays.image && overlays.density && overlays.target && !overlays.points);

        assert!(!app.handle_key("q"));
    }

    #[test]
    fn test_advance_and_reset() {
        let Some(mut app) = headless_state(BackendKind::Cpu) else { return };
        app.advance(1.0 / 60.0);
        app.advance(1.0 / 60.0);
        assert_eq!(app.backend().frame(), 2);
        assert!(app.last_step().is_some());

        app.reset().unwrap();
        assert_eq!(app.backend().frame(), 0);
        assert!(app.last_step().is_none());
    }

    #[test]
    fn test_switch_backend_round_trip() {
        let Some(mut app) = headless_state(BackendKind::Cpu) else { return };
        app.advance(1.0 / 60.0);

        assert!(app.handle_key("c"));
        assert_eq!(app.backend().kind(), BackendKind::Gpu);
        assert_eq!(app.backend().frame(), 0);
        app.advance(1.0 / 60.0);
        assert!(app.last_step().is_none());
        app.prepare();

        assert_eq!(app.switch_backend().unwrap(), BackendKind::Cpu);
        assert_eq!(app.backend().kind(), BackendKind::Cpu);
    }
}
