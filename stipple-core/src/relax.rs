//! One relaxation frame: splat → blur-X → blur-Y → move.
//!
//! ```text
//!  PointSet ──splat──▶ density ─┐
//!  Image ───inject──▶ target  ─┤ blur-X (→ swap) → blur-Y (→ field, ×decay)
//!                              ▼
//!            r = (target − density) / ρ_ref
//!                              │
//!  PointSet ◀──move── speed·dt·∇r, |Δ| ≤ max_step, clamped to bounds
//! ```
//!
//! The target field runs through exactly the same filter as the density,
//! with the image injected at `num_dots` total mass per frame.  The two
//! fields therefore share units and spatial scale at every frame, including
//! the warm-up frames right after a reset.
//!
//! Stages are strictly sequential: each reads the complete output of the
//! previous one.  The functions are free of hidden state; a [`Session`]
//! owns the buffers and drives them once per frame.
//!
//! [`Session`]: crate::session::Session

use crate::blur::BlurFilter;
use crate::config::StippleConfig;
use crate::field::{DensityField, Field, Footprint};
use crate::points::{Point, PointSet};
use crate::sampler::ImageSampler;

/// Everything a frame needs besides the buffers themselves.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StepParams {
    pub filter: BlurFilter,
    /// Image intensity → injected target mass.
    pub inject_scale: f32,
    /// Expected accumulated density per pixel at this frame.
    pub reference_density: f32,
    pub speed: f32,
    pub max_step: f32,
    /// Zero-based index of the frame being computed.
    pub frame: u64,
}

impl StepParams {
    pub fn for_frame(
        config: &StippleConfig,
        inject_scale: f32,
        width: u32,
        height: u32,
        frame: u64,
    ) -> Self {
        Self {
            filter: config.blur_filter(),
            inject_scale,
            reference_density: reference_density(config.num_dots, width, height, config.decay, frame + 1),
            speed: config.speed,
            max_step: config.max_step,
            frame,
        }
    }
}

/// Per-frame summary, cheap enough to compute every frame.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StepStats {
    pub frame: u64,
    pub mean_displacement: f32,
    pub max_displacement: f32,
    /// Mean `|target − density| / ρ_ref` at the points, before moving.
    pub mean_residual: f32,
    /// Mean image intensity under the points, before moving.
    pub mean_intensity: f32,
}

/// Scale that injects `num_dots` units of target mass per frame.
pub fn inject_scale(num_dots: usize, image: &ImageSampler) -> f32 {
    let total = image.total();
    if num_dots == 0 || total <= 0.0 {
        0.0
    } else {
        (num_dots as f64 / total) as f32
    }
}

/// Mean accumulated density per pixel after `frames` frames of injecting
/// `num_dots` units and decaying: `(n / (w·h)) · Σ_{k=1..frames} decayᵏ`.
///
/// The blur conserves mass, so this is exactly the mean of the target field.
pub fn reference_density(num_dots: usize, width: u32, height: u32, decay: f32, frames: u64) -> f32 {
    let pixels = width as f64 * height as f64;
    if num_dots == 0 || pixels == 0.0 || frames == 0 {
        return 0.0;
    }
    let d = decay as f64;
    let series = if (1.0 - d).abs() < 1e-12 {
        frames as f64
    } else {
        let exponent = frames.min(i32::MAX as u64) as i32;
        d * (1.0 - d.powi(exponent)) / (1.0 - d)
    };
    (num_dots as f64 / pixels * series) as f32
}

/// Stage 1a: deposit one unit per point, bilinearly.
///
/// Accumulation is a plain sum, so the result is independent of point order
/// up to floating-point rounding.
pub fn splat(points: &[Point], density: &mut Field) {
    for p in points {
        density.splat(p.x, p.y, 1.0);
    }
}

/// Stage 1b: add this frame's target mass.
pub fn inject(image: &ImageSampler, scale: f32, target: &mut Field) {
    if scale == 0.0 {
        return;
    }
    target.add_scaled(image.as_field(), scale);
}

/// Stages 2–3: blur-X then blur-Y (with decay) on density and target.
pub fn diffuse(fields: &mut DensityField, filter: &BlurFilter) {
    filter.apply(&mut fields.density, &mut fields.swap);
    filter.apply(&mut fields.target, &mut fields.swap);
}

/// Normalized residual `(target − density) / ρ_ref` over the blurred fields.
pub struct Residual<'a> {
    target: &'a Field,
    density: &'a Field,
    inv_reference: f32,
}

impl<'a> Residual<'a> {
    pub fn new(fields: &'a DensityField, reference_density: f32) -> Self {
        let inv_reference = if reference_density > 0.0 { 1.0 / reference_density } else { 0.0 };
        Self { target: &fields.target, density: &fields.density, inv_reference }
    }

    #[inline]
    fn at(&self, i: i64, j: i64) -> f32 {
        (self.target.get_clamped(i, j) - self.density.get_clamped(i, j)) * self.inv_reference
    }

    /// Central difference at pixel `(i, j)`, clamp-to-edge.
    #[inline]
    pub fn cell_gradient(&self, i: i64, j: i64) -> [f32; 2] {
        [
            0.5 * (self.at(i + 1, j) - self.at(i - 1, j)),
            0.5 * (self.at(i, j + 1) - self.at(i, j - 1)),
        ]
    }

    /// Residual value at a continuous position.
    #[inline]
    pub fn value(&self, x: f32, y: f32) -> f32 {
        (self.target.sample(x, y) - self.density.sample(x, y)) * self.inv_reference
    }

    /// Cell gradients interpolated bilinearly at a continuous position.
    #[inline]
    pub fn gradient(&self, x: f32, y: f32) -> [f32; 2] {
        let footprint = Footprint::new(x, y, self.target.width(), self.target.height());
        let mut g = [0.0f32; 2];
        for ((i, j), w) in footprint.corners() {
            if w == 0.0 {
                continue;
            }
            let [gx, gy] = self.cell_gradient(i as i64, j as i64);
            g[0] += w * gx;
            g[1] += w * gy;
        }
        g
    }
}

/// Stage 4: move every point up the residual gradient.
pub fn move_points(
    points: &mut PointSet,
    image: &ImageSampler,
    fields: &DensityField,
    params: &StepParams,
    dt: f32,
) -> StepStats {
    let mut stats = StepStats { frame: params.frame, ..Default::default() };
    if points.is_empty() {
        return stats;
    }

    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    let gain = params.speed * dt;
    let residual = Residual::new(fields, params.reference_density);

    let mut total_displacement = 0.0f64;
    let mut total_residual = 0.0f64;
    let mut total_intensity = 0.0f64;

    for idx in 0..points.len() {
        let p = points.as_slice()[idx];

        let target = image.sample(p.x, p.y);
        let current = fields.density.sample(p.x, p.y);
        total_intensity += target as f64;
        total_residual += ((fields.target.sample(p.x, p.y) - current) * residual.inv_reference).abs() as f64;

        let [gx, gy] = residual.gradient(p.x, p.y);
        let (mut dx, mut dy) = (gx * gain, gy * gain);
        let len = (dx * dx + dy * dy).sqrt();
        if len > params.max_step {
            let k = params.max_step / len;
            dx *= k;
            dy *= k;
        }

        let moved = points.clamp(Point::new(p.x + dx, p.y + dy));
        points.as_mut_slice()[idx] = moved;

        let actual = ((moved.x - p.x).powi(2) + (moved.y - p.y).powi(2)).sqrt();
        total_displacement += actual as f64;
        stats.max_displacement = stats.max_displacement.max(actual);
    }

    let n = points.len() as f64;
    stats.mean_displacement = (total_displacement / n) as f32;
    stats.mean_residual = (total_residual / n) as f32;
    stats.mean_intensity = (total_intensity / n) as f32;
    stats
}

/// One full frame over explicit state.
pub fn step(
    points: &mut PointSet,
    fields: &mut DensityField,
    image: &ImageSampler,
    params: &StepParams,
    dt: f32,
) -> StepStats {
    splat(points.as_slice(), &mut fields.density);
    inject(image, params.inject_scale, &mut fields.target);
    diffuse(fields, &params.filter);
    move_points(points, image, fields, params, dt)
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform_image(w: u32, h: u32, v: f32) -> ImageSampler {
        ImageSampler::from_luma(w, h, vec![v; (w * h) as usize]).unwrap()
    }

    #[test]
    fn test_reference_density_closed_form() {
        // 16 dots on 4×4 → 1 per pixel per frame.
        assert!((reference_density(16, 4, 4, 1.0, 5) - 5.0).abs() < 1e-6);
        let expected = 0.9 + 0.81 + 0.729;
        assert!((reference_density(16, 4, 4, 0.9, 3) - expected).abs() < 1e-5);
        assert_eq!(reference_density(0, 4, 4, 0.9, 3), 0.0);
        assert_eq!(reference_density(16, 4, 4, 0.9, 0), 0.0);
    }

    #[test]
    fn test_reference_density_matches_target_mean() {
        let image = ImageSampler::from_luma(6, 5, (0..30).map(|i| (i % 7) as f32 / 6.0).collect()).unwrap();
        let config = StippleConfig { num_dots: 90, blur_strength: 0.7, decay: 0.93, ..Default::default() };
        let scale = inject_scale(config.num_dots, &image);
        let mut fields = DensityField::new(6, 5).unwrap();

        for frame in 0..20 {
            let params = StepParams::for_frame(&config, scale, 6, 5, frame);
            inject(&image, params.inject_scale, &mut fields.target);
            diffuse(&mut fields, &params.filter);
            let mean = fields.target.mean() as f32;
            assert!((mean - params.reference_density).abs() < 1e-3 * mean.max(1.0));
        }
    }

    #[test]
    fn test_inject_scale() {
        let image = uniform_image(4, 4, 0.5);
        assert!((inject_scale(16, &image) - 2.0).abs() < 1e-6);
        assert_eq!(inject_scale(0, &image), 0.0);
        assert_eq!(inject_scale(10, &uniform_image(4, 4, 0.0)), 0.0);
    }

    #[test]
    fn test_splat_mass_equals_point_count() {
        let mut density = Field::zeros(8, 8).unwrap();
        let points = [Point::new(0.0, 0.0), Point::new(3.3, 4.7), Point::new(7.99, 7.99)];
        splat(&points, &mut density);
        assert!((density.sum() - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_residual_gradient_points_toward_target() {
        let mut fields = DensityField::new(8, 1).unwrap();
        for i in 0..8 {
            fields.target.set(i, 0, i as f32);
        }
        let residual = Residual::new(&fields, 1.0);
        let [gx, gy] = residual.gradient(3.5, 0.5);
        assert!((gx - 1.0).abs() < 1e-6);
        assert_eq!(gy, 0.0);
    }

    #[test]
    fn test_residual_gradient_points_away_from_density() {
        let mut fields = DensityField::new(8, 8).unwrap();
        fields.density.set(4, 4, 10.0);
        let residual = Residual::new(&fields, 1.0);
        // Left of the bump: pushed further left.
        let [gx, _] = residual.gradient(3.5, 4.5);
        assert!(gx < 0.0);
        // Below the bump: pushed further down.
        let [_, gy] = residual.gradient(4.5, 5.5);
        assert!(gy > 0.0);
    }

    #[test]
    fn test_move_respects_max_step() {
        let image = uniform_image(16, 16, 1.0);
        let mut fields = DensityField::new(16, 16).unwrap();
        for i in 0..16 {
            for j in 0..16 {
                fields.target.set(i, j, 100.0 * i as f32);
            }
        }
        let mut points = PointSet::from_points(vec![Point::new(8.0, 8.0)], 16, 16);
        let params = StepParams {
            filter: BlurFilter::new(0.5, 0.99),
            inject_scale: 1.0,
            reference_density: 1.0,
            speed: 1_000.0,
            max_step: 0.75,
            frame: 0,
        };
        let stats = move_points(&mut points, &image, &fields, &params, 1.0 / 60.0);
        assert!((stats.max_displacement - 0.75).abs() < 1e-5);
        assert!(points.as_slice()[0].x > 8.0);
    }

    #[test]
    fn test_non_finite_dt_does_not_move() {
        let image = uniform_image(4, 4, 1.0);
        let mut fields = DensityField::new(4, 4).unwrap();
        fields.target.set(3, 0, 50.0);
        let mut points = PointSet::from_points(vec![Point::new(1.0, 1.0)], 4, 4);
        let params = StepParams::for_frame(&StippleConfig::default(), 1.0, 4, 4, 0);
        for dt in [f32::NAN, f32::INFINITY, -1.0] {
            let stats = move_points(&mut points, &image, &fields, &params, dt);
            assert_eq!(stats.max_displacement, 0.0);
        }
        assert_eq!(points.as_slice()[0], Point::new(1.0, 1.0));
    }

    #[test]
    fn test_empty_point_set_decays_fields() {
        let image = uniform_image(6, 6, 0.5);
        let mut fields = DensityField::new(6, 6).unwrap();
        fields.density.fill(1.0);
        let mut points = PointSet::from_points(Vec::new(), 6, 6);
        let config = StippleConfig { num_dots: 0, decay: 0.9, ..Default::default() };

        let mut previous = fields.density.sum();
        for frame in 0..200 {
            let params = StepParams::for_frame(&config, 0.0, 6, 6, frame);
            let stats = step(&mut points, &mut fields, &image, &params, 1.0 / 60.0);
            assert_eq!(stats, StepStats { frame, ..Default::default() });
            let sum = fields.density.sum();
            assert!(sum < previous);
            previous = sum;
        }
        assert!(previous < 1e-6);
        assert_eq!(fields.target.sum(), 0.0);
    }
}
