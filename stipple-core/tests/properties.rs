//! Property tests over arbitrary point sets and fields.

use proptest::prelude::*;

use stipple_core::field::{DensityField, Field};
use stipple_core::relax::{self, StepParams};
use stipple_core::{BlurFilter, ImageSampler, Point, PointSet, StippleConfig};

const W: u32 = 12;
const H: u32 = 7;

fn any_point() -> impl Strategy<Value = Point> {
    (0.0f32..W as f32, 0.0f32..H as f32).prop_map(|(x, y)| Point::new(x, y))
}

fn any_points() -> impl Strategy<Value = Vec<Point>> {
    prop::collection::vec(any_point(), 0..64)
}

proptest! {
    #[test]
    fn splat_ignores_point_order(
        (points, shuffled) in any_points().prop_flat_map(|p| (Just(p.clone()), Just(p).prop_shuffle())),
    ) {
        let mut forward = Field::zeros(W, H).unwrap();
        relax::splat(&points, &mut forward);

        let mut permuted = Field::zeros(W, H).unwrap();
        relax::splat(&shuffled, &mut permuted);

        for (a, b) in forward.as_slice().iter().zip(permuted.as_slice()) {
            prop_assert!((a - b).abs() < 1e-4, "{a} vs {b}");
        }
    }

    #[test]
    fn splat_deposits_one_unit_per_point(points in any_points()) {
        let mut density = Field::zeros(W, H).unwrap();
        relax::splat(&points, &mut density);
        prop_assert!((density.sum() - points.len() as f64).abs() < 1e-3);
        prop_assert!(density.as_slice().iter().all(|&v| v >= 0.0));
    }

    #[test]
    fn blur_scales_mass_by_decay(
        points in any_points(),
        strength in 0.0f32..=1.0,
        decay in 0.9f32..=1.0,
    ) {
        let mut field = Field::zeros(W, H).unwrap();
        relax::splat(&points, &mut field);
        let before = field.sum();

        let mut swap = Field::zeros(W, H).unwrap();
        BlurFilter::new(strength, decay).apply(&mut field, &mut swap);
        prop_assert!((field.sum() - before * decay as f64).abs() < 1e-3);
    }

    #[test]
    fn step_keeps_points_in_bounds(
        points in any_points(),
        speed in 1.0f32..5_000.0,
        max_step in 0.01f32..4.0,
        dt in prop_oneof![Just(f32::NAN), Just(0.0f32), 0.0f32..0.5],
    ) {
        let image = ImageSampler::from_luma(
            W,
            H,
            (0..W * H).map(|k| ((k * 37) % 11) as f32 / 10.0).collect(),
        ).unwrap();
        let n = points.len();
        let mut set = PointSet::from_points(points, W, H);
        let mut fields = DensityField::new(W, H).unwrap();
        let config = StippleConfig { num_dots: n, speed, max_step, ..Default::default() };
        let scale = relax::inject_scale(n, &image);

        for frame in 0..5 {
            let params = StepParams::for_frame(&config, scale, W, H, frame);
            let stats = relax::step(&mut set, &mut fields, &image, &params, dt);
            prop_assert!(stats.max_displacement <= max_step + 1e-4);
            prop_assert!(stats.mean_displacement.is_finite());
        }
        prop_assert_eq!(set.len(), n);
        for p in set.iter() {
            prop_assert!(set.contains(*p), "{:?} escaped", p);
        }
    }
}
