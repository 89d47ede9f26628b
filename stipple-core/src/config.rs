//! Session configuration.
//!
//! All values are supplied by the host; none are computed.  A config is
//! validated once, before a session starts; an invalid config never reaches
//! the frame loop.

use std::path::Path;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::blur::BlurFilter;
use crate::error::{ConfigError, StippleError};
use crate::sampler::ImageSampler;

/// Largest supported dot population.
pub const MAX_DOTS: usize = 10_000;

/// Tunable parameters of a stippling session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StippleConfig {
    /// Number of dots, `0..=MAX_DOTS`.  Changing it requires a reset.
    pub num_dots: usize,
    /// Rendered disc diameter in image pixels, `[0, 10]`.
    pub dot_size: f32,
    /// Blend between identity and the binomial kernel, `[0, 1]`.
    pub blur_strength: f32,
    /// Per-frame multiplier on the accumulated fields, `[0.9, 1]`.
    pub decay: f32,
    /// Draw the dots at all.
    pub render_points: bool,
    /// Dark pixels attract dots instead of bright ones.
    pub invert: bool,
    /// Pixels per second per unit of normalized residual gradient.
    pub speed: f32,
    /// Largest displacement a dot may take in one frame, in pixels.
    pub max_step: f32,
    /// Seed for the initial distribution; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for StippleConfig {
    fn default() -> Self {
        Self {
            num_dots: 4_000,
            dot_size: 2.0,
            blur_strength: 0.5,
            decay: 0.99,
            render_points: true,
            invert: false,
            speed: 60.0,
            max_step: 1.0,
            seed: None,
        }
    }
}

impl StippleConfig {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_dots > MAX_DOTS {
            return Err(ConfigError::TooManyDots(self.num_dots));
        }
        if !(0.0..=10.0).contains(&self.dot_size) {
            return Err(ConfigError::DotSize(self.dot_size));
        }
        if !(0.0..=1.0).contains(&self.blur_strength) {
            return Err(ConfigError::BlurStrength(self.blur_strength));
        }
        if !(0.9..=1.0).contains(&self.decay) {
            return Err(ConfigError::Decay(self.decay));
        }
        if !(self.speed.is_finite() && self.speed > 0.0) {
            return Err(ConfigError::Speed(self.speed));
        }
        if !(self.max_step.is_finite() && self.max_step > 0.0) {
            return Err(ConfigError::MaxStep(self.max_step));
        }
        Ok(())
    }

    /// Parse and validate a JSON config.  Missing keys take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, StippleError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, StippleError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn to_json_pretty(&self) -> Result<String, StippleError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn blur_filter(&self) -> BlurFilter {
        BlurFilter::new(self.blur_strength, self.decay)
    }

    /// Random source for the initial distribution and every reset.
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        }
    }

    /// The image a session stipples: `image` itself, or its inversion when
    /// `invert` is set.  Dots need somewhere to go, so an image with no
    /// intensity is rejected unless `num_dots` is zero.
    pub fn stippled_image(&self, image: &Arc<ImageSampler>) -> Result<Arc<ImageSampler>, ConfigError> {
        let image = if self.invert { Arc::new(image.inverted()) } else { Arc::clone(image) };
        if self.num_dots > 0 && image.total() <= 0.0 {
            return Err(ConfigError::NoIntensity(self.num_dots));
        }
        Ok(image)
    }
}

// ===================================================================
// Tests
// ===================================================================
