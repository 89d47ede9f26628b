//! Stipple Desktop — interactive density-relaxation stippling.
//!
//! Uses `winit` 0.30 for windowing and input, `stipple-render` for GPU
//! compute and rendering, and `stipple-core` for the CPU backend.
//!
//! ```text
//! stipple-desktop <image> [config.json] [--cpu]
//! ```
//!
//! Keys: `Space` reset, `Z` image overlay, `X` density overlay,
//! `T` target instead of density, `P` points, `C` switch CPU/GPU,
//! `Escape` quit.  Drag with the middle or right button to pan, scroll
//! to zoom.

mod state;

use log::info;
use std::path::PathBuf;
use std::sync::Arc;
use winit::{
    application::ApplicationHandler,
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, NamedKey},
    window::{Window, WindowAttributes, WindowId},
};

use stipple_core::{ImageSampler, StippleConfig};
use stipple_render::context::GpuContext;
use stipple_render::renderer::RenderError;
use state::{AppState, BackendKind};

const USAGE: &str = "usage: stipple-desktop <image> [config.json] [--cpu]";

/// Parsed command line.
#[derive(Debug, PartialEq)]
struct Args {
    image: PathBuf,
    config: Option<PathBuf>,
    backend: BackendKind,
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<Args, String> {
    let mut positional = Vec::new();
    let mut backend = BackendKind::Gpu;
    for arg in args {
        match arg.as_str() {
            "--cpu" => backend = BackendKind::Cpu,
            flag if flag.starts_with("--") => return Err(format!("unknown flag {flag}")),
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    let mut positional = positional.into_iter();
    let image = positional.next().ok_or("missing image path")?;
    let config = positional.next();
    if let Some(extra) = positional.next() {
        return Err(format!("unexpected argument {}", extra.display()));
    }
    Ok(Args { image, config, backend })
}

/// Winit 0.30 application handler.
struct App {
    config: StippleConfig,
    image: Arc<ImageSampler>,
    backend: BackendKind,
    window: Option<Arc<Window>>,
    state: Option<AppState>,
    // Mouse tracking for pan gestures.
    mouse_pressed: bool,
    last_mouse: (f64, f64),
    frame_count: u64,
}

impl App {
    fn new(config: StippleConfig, image: Arc<ImageSampler>, backend: BackendKind) -> Self {
        Self {
            config,
            image,
            backend,
            window: None,
            state: None,
            mouse_pressed: false,
            last_mouse: (0.0, 0.0),
            frame_count: 0,
        }
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return; // Already initialized.
        }

        let attrs = WindowAttributes::default()
            .with_title("Stipple")
            .with_inner_size(LogicalSize::new(1024, 768))
            .with_min_inner_size(LogicalSize::new(320, 240));

        let window = Arc::new(
            event_loop
                .create_window(attrs)
                .expect("Failed to create window"),
        );

        let size = window.inner_size();

        let gpu = pollster::block_on(GpuContext::new_with_surface(
            window.clone(),
            size.width.max(1),
            size.height.max(1),
        ))
        .expect("Failed to initialize GPU");

        let app_state = AppState::new(
            gpu,
            size.width.max(1),
            size.height.max(1),
            self.config.clone(),
            Arc::clone(&self.image),
            self.backend,
        )
        .expect("Failed to start stippling");

        info!(
            "Stipple Desktop initialized: {}×{}, GPU: {:?}",
            size.width,
            size.height,
            app_state.gpu.adapter.get_info().name
        );

        window.request_redraw();
        self.state = Some(app_state);
        self.window = Some(window);
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        let (Some(window), Some(state)) = (self.window.as_ref(), self.state.as_mut()) else {
            return;
        };

        match event {
            // ── Close / keys ────────────────────────────────────
            WindowEvent::CloseRequested => {
                info!("Window closed after {} frames", self.frame_count);
                event_loop.exit();
            }
            WindowEvent::KeyboardInput { event, .. }
                if event.state == ElementState::Pressed && !event.repeat =>
            {
                match event.logical_key.as_ref() {
                    Key::Named(NamedKey::Escape) => {
                        info!("Escape pressed after {} frames", self.frame_count);
                        event_loop.exit();
                    }
                    Key::Named(NamedKey::Space) => {
                        if let Err(e) = state.reset() {
                            log::error!("Reset failed: {e}");
                        }
                    }
                    Key::Character(key) => {
                        state.handle_key(key);
                    }
                    _ => {}
                }
            }

            // ── Resize ──────────────────────────────────────────
            WindowEvent::Resized(new_size) => {
                state.resize(new_size.width, new_size.height);
                window.request_redraw();
            }

            // ── Mouse → pan / zoom ──────────────────────────────
            WindowEvent::CursorMoved {
                position: PhysicalPosition { x, y },
                ..
            } => {
                if self.mouse_pressed {
                    let dx = x - self.last_mouse.0;
                    let dy = y - self.last_mouse.1;
                    state.pan(dx as f32, dy as f32);
                }
                self.last_mouse = (x, y);
            }
            WindowEvent::MouseInput { state: btn_state, button, .. } => {
                if matches!(button, MouseButton::Middle | MouseButton::Right) {
                    self.mouse_pressed = btn_state == ElementState::Pressed;
                }
            }
            WindowEvent::MouseWheel { delta, .. } => {
                let dy = match delta {
                    MouseScrollDelta::LineDelta(_, y) => y,
                    MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / 50.0,
                };
                state.zoom_at(self.last_mouse.0 as f32, self.last_mouse.1 as f32, dy);
            }

            // ── Redraw ──────────────────────────────────────────
            WindowEvent::RedrawRequested => {
                match state.render_frame() {
                    Ok(stats) => {
                        self.frame_count += 1;
                        if self.frame_count % 300 == 0 {
                            info!(
                                "Frame {}: {:?} backend, {} dots, {} draw call(s)",
                                self.frame_count,
                                state.backend().kind(),
                                stats.dot_count,
                                stats.draw_calls
                            );
                            if let Some(step) = state.last_step() {
                                info!(
                                    "  mean step {:.4} px, residual {:.4}, intensity under dots {:.3} (image mean {:.3}, speed {})",
                                    step.mean_displacement,
                                    step.mean_residual,
                                    step.mean_intensity,
                                    state.backend().image().mean(),
                                    state.config().speed
                                );
                            }
                        }
                    }
                    Err(RenderError::Surface(
                        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated,
                    )) => {
                        // Reconfigure surface on lost/outdated.
                        let size = window.inner_size();
                        state.resize(size.width, size.height);
                    }
                    Err(e) => {
                        log::error!("Render error: {e}");
                    }
                }
                // The relaxation advances once per redraw.
                window.request_redraw();
            }

            _ => {}
        }
    }
}

fn main() {
    env_logger::init();

    let args = match parse_args(std::env::args().skip(1)) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{e}\n{USAGE}");
            std::process::exit(2);
        }
    };

    let config = match &args.config {
        Some(path) => StippleConfig::from_json_file(path).expect("Failed to load config"),
        None => StippleConfig::default(),
    };
    let image = Arc::new(ImageSampler::open(&args.image).expect("Failed to load image"));

    info!(
        "Starting Stipple Desktop: {} ({}×{}), {} dots",
        args.image.display(),
        image.width(),
        image.height(),
        config.num_dots
    );

    let event_loop = EventLoop::new().expect("Failed to create event loop");
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(config, image, args.backend);
    event_loop.run_app(&mut app).expect("Event loop error");
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args, String> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_image_only() {
        let parsed = args(&["photo.png"]).unwrap();
        assert_eq!(parsed.image, PathBuf::from("photo.png"));
        assert_eq!(parsed.config, None);
        assert_eq!(parsed.backend, BackendKind::Gpu);
    }

    #[test]
    fn test_parse_config_and_cpu_flag() {
        let parsed = args(&["--cpu", "photo.png", "settings.json"]).unwrap();
        assert_eq!(parsed.config, Some(PathBuf::from("settings.json")));
        assert_eq!(parsed.backend, BackendKind::Cpu);
    }

    #[test]
    fn test_parse_errors() {
        assert!(args(&[]).is_err());
        assert!(args(&["a.png", "b.json", "c"]).is_err());
        assert!(args(&["a.png", "--fast"]).is_err());
    }
}
