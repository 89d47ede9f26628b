//! CPU → GPU bridge: converts `stipple_core` state into the buffer layouts
//! the compute passes and render pipelines consume.
//!
//! Nothing here touches a device, so all of it is testable without a GPU.

use stipple_core::field::Field;
use stipple_core::relax::StepParams;
use stipple_core::{upper_bound, ImageSampler, Point, StippleConfig};

use crate::vertex::{ComputeParams, GpuPoint};

/// Overlay brightness per unit of `ρ_ref`: the mean density shows at half
/// intensity, twice the mean saturates.
pub const DENSITY_OVERLAY_GAIN: f32 = 0.5;

/// Points as dot-pipeline instances.
pub fn collect_points(points: &[Point]) -> Vec<GpuPoint> {
    points.iter().copied().map(GpuPoint::from).collect()
}

/// Interleave density and target into the `vec2` layout of the GPU field
/// buffer.
pub fn interleave_fields(density: &Field, target: &Field) -> Vec<[f32; 2]> {
    debug_assert_eq!(density.len(), target.len());
    density
        .as_slice()
        .iter()
        .zip(target.as_slice())
        .map(|(&d, &t)| [d, t])
        .collect()
}

/// Image overlay values.  The plane is drawn in the dot ink color with
/// alpha equal to the stippled intensity, so ink covers what dots cover.
pub fn image_plane(image: &ImageSampler) -> Vec<[f32; 2]> {
    image.as_slice().iter().map(|&v| [v, 0.0]).collect()
}

/// Overlay scale for a density field whose expected mean is `reference`.
pub fn density_overlay_scale(reference: f32) -> f32 {
    if reference > 0.0 {
        DENSITY_OVERLAY_GAIN / reference
    } else {
        0.0
    }
}

/// Uniforms for the compute passes of frame `frame`.
///
/// Uses the same [`StepParams`] the CPU session derives, so both backends
/// see identical taps, decay, `ρ_ref` and step limits.
pub fn compute_params(
    config: &StippleConfig,
    inject_scale: f32,
    width: u32,
    height: u32,
    num_points: u32,
    frame: u64,
    dt: f32,
) -> ComputeParams {
    let step = StepParams::for_frame(config, inject_scale, width, height, frame);
    let [k0, k1, k2] = step.filter.taps();
    let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
    let inv_reference = if step.reference_density > 0.0 { 1.0 / step.reference_density } else { 0.0 };

    ComputeParams {
        width,
        height,
        num_points,
        _pad0: 0,
        taps: [k0, k1, k2, step.filter.decay],
        inject_scale: step.inject_scale,
        inv_reference,
        gain: step.speed * dt,
        max_step: step.max_step,
        bound: [upper_bound(width), upper_bound(height)],
        _pad1: [0.0; 2],
    }
}

// ===================================================================
// Tests
// ===================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use stipple_core::relax;

    #[test]
    fn test_collect_points() {
        let points = [Point::new(0.5, 1.0), Point::new(3.0, 2.25)];
        let gpu = collect_points(&points);
        assert_eq!(gpu, vec![GpuPoint::new(0.5, 1.0), GpuPoint::new(3.0, 2.25)]);
        assert!(collect_points(&[]).is_empty());
    }

    #[test]
    fn test_interleave_fields() {
        let mut density = Field::zeros(2, 1).unwrap();
        let mut target = Field::zeros(2, 1).unwrap();
        density.set(1, 0, 3.0);
        target.set(0, 0, 5.0);
        assert_eq!(interleave_fields(&density, &target), vec![[0.0, 5.0], [3.0, 0.0]]);
    }

    #[test]
    fn test_image_plane_stores_ink_coverage() {
        let image = ImageSampler::from_luma(3, 1, vec![0.0, 0.25, 1.0]).unwrap();
        assert_eq!(image_plane(&image), vec![[0.0, 0.0], [0.25, 0.0], [1.0, 0.0]]);
    }

    #[test]
    fn test_density_overlay_scale() {
        assert_eq!(density_overlay_scale(0.0), 0.0);
        assert!((density_overlay_scale(4.0) * 4.0 - DENSITY_OVERLAY_GAIN).abs() < 1e-6);
    }

    #[test]
    fn test_compute_params_match_cpu_step() {
        let config = StippleConfig { num_dots: 32, blur_strength: 0.6, decay: 0.95, speed: 30.0, max_step: 0.5, ..Default::default() };
        let params = compute_params(&config, 2.0, 8, 4, 32, 3, 0.02);

        assert_eq!((params.width, params.height, params.num_points), (8, 4, 32));
        let [k0, k1, k2] = config.blur_filter().taps();
        assert_eq!(params.taps, [k0, k1, k2, 0.95]);
        let reference = relax::reference_density(32, 8, 4, 0.95, 4);
        assert!((params.inv_reference * reference - 1.0).abs() < 1e-5);
        assert!((params.gain - 0.6).abs() < 1e-6);
        assert_eq!(params.max_step, 0.5);
        assert!(params.bound[0] < 8.0 && params.bound[1] < 4.0);
    }

    #[test]
    fn test_compute_params_sanitize_dt() {
        let config = StippleConfig::default();
        for dt in [f32::NAN, f32::NEG_INFINITY, -0.5] {
            assert_eq!(compute_params(&config, 1.0, 4, 4, 1, 0, dt).gain, 0.0);
        }
    }

    #[test]
    fn test_compute_params_zero_dots() {
        let config = StippleConfig { num_dots: 0, ..Default::default() };
        let params = compute_params(&config, 0.0, 4, 4, 0, 10, 0.016);
        assert_eq!(params.inv_reference, 0.0);
        assert_eq!(params.inject_scale, 0.0);
    }
}
