//! Session lifecycle: `start` acquires every buffer, `step` advances one
//! frame, `reset` rebuilds from scratch, `stop` releases.
//!
//! A session owns its points and fields outright; all mutation goes through
//! `&mut self`, so a reset can never overlap a frame in progress.  Buffers
//! are plain owned allocations and are released by `Drop` on every path,
//! including an error halfway through `start`.

use std::sync::Arc;

use log::{debug, info};
use rand::rngs::StdRng;

use crate::config::StippleConfig;
use crate::error::StippleError;
use crate::field::{DensityField, Field};
use crate::points::{Point, PointSet};
use crate::relax::{self, StepParams, StepStats};
use crate::sampler::ImageSampler;

/// A running stippling session over one image.
pub struct Session {
    config: StippleConfig,
    /// The image as supplied by the host.
    source: Arc<ImageSampler>,
    /// The image actually stippled (`source` or its inversion).
    image: Arc<ImageSampler>,
    points: PointSet,
    fields: DensityField,
    rng: StdRng,
    inject_scale: f32,
    frame: u64,
}

impl Session {
    /// Validate `config` against `image` and allocate a fresh session.
    ///
    /// With `config.invert` set the session stipples the inverted image;
    /// the caller's sampler is left untouched.
    pub fn start(config: StippleConfig, image: Arc<ImageSampler>) -> Result<Self, StippleError> {
        config.validate()?;
        let source = image;
        let image = config.stippled_image(&source)?;

        let mut rng = config.rng();
        let points = PointSet::random(config.num_dots, image.width(), image.height(), &mut rng)?;
        let fields = DensityField::new(image.width(), image.height())?;
        let inject_scale = relax::inject_scale(config.num_dots, &image);

        info!(
            "Session started: {} dots on {}×{} (blur {:.2}, decay {:.3})",
            config.num_dots,
            image.width(),
            image.height(),
            config.blur_strength,
            config.decay
        );

        Ok(Self { config, source, image, points, fields, rng, inject_scale, frame: 0 })
    }

    /// Release the session.  Equivalent to dropping it.
    pub fn stop(self) {
        debug!("Session stopped after {} frames", self.frame);
    }

    /// Discard all state and redistribute the points uniformly at random.
    ///
    /// The random stream continues, so each reset draws a new distribution
    /// even for a seeded session.
    pub fn reset(&mut self) -> Result<(), StippleError> {
        let (w, h) = (self.image.width(), self.image.height());
        let points = PointSet::random(self.config.num_dots, w, h, &mut self.rng)?;
        let fields = DensityField::new(w, h)?;
        self.points = points;
        self.fields = fields;
        self.frame = 0;
        info!("Session reset: {} dots", self.config.num_dots);
        Ok(())
    }

    /// Replace the configuration and reset.  On error the session keeps its
    /// previous configuration and state.
    pub fn reconfigure(&mut self, config: StippleConfig) -> Result<(), StippleError> {
        let next = Self::start(config, Arc::clone(&self.source))?;
        *self = next;
        Ok(())
    }

    /// Advance one frame.  `dt` is the elapsed time in seconds.
    pub fn step(&mut self, dt: f32) -> StepStats {
        let params = self.params();
        let stats = relax::step(&mut self.points, &mut self.fields, &self.image, &params, dt);
        self.frame += 1;
        stats
    }

    /// Parameters for the next frame.
    pub fn params(&self) -> StepParams {
        StepParams::for_frame(
            &self.config,
            self.inject_scale,
            self.image.width(),
            self.image.height(),
            self.frame,
        )
    }

    /// `ρ_ref` of the most recently computed frame; zero before the first.
    pub fn reference_density(&self) -> f32 {
        relax::reference_density(
            self.config.num_dots,
            self.image.width(),
            self.image.height(),
            self.config.decay,
            self.frame,
        )
    }

    pub fn config(&self) -> &StippleConfig {
        &self.config
    }

    /// The image being stippled (inverted when `config.invert` is set).
    pub fn image(&self) -> &ImageSampler {
        &self.image
    }

    pub fn points(&self) -> &[Point] {
        self.points.as_slice()
    }

    pub fn point_set(&self) -> &PointSet {
        &self.points
    }

    pub fn density(&self) -> &Field {
        &self.fields.density
    }

    pub fn target(&self) -> &Field {
        &self.fields.target
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }
}

// ===================================================================
// Tests
// ===================================================================
