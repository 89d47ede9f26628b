//! Benchmarks for the CPU relaxation stages.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stipple_core::field::Field;
use stipple_core::{relax, BlurFilter, ImageSampler, Session, StippleConfig};

fn gradient_image(w: u32, h: u32) -> Arc<ImageSampler> {
    let data = (0..w * h)
        .map(|k| ((k % w) + (k / w)) as f32 / (w + h) as f32)
        .collect();
    Arc::new(ImageSampler::from_luma(w, h, data).unwrap())
}

fn bench_splat(c: &mut Criterion) {
    let mut group = c.benchmark_group("splat");
    let image = gradient_image(512, 512);
    for &count in &[1_000, 4_000, 10_000] {
        let config = StippleConfig { num_dots: count, seed: Some(1), ..Default::default() };
        let points = Session::start(config, Arc::clone(&image)).unwrap().points().to_vec();
        let mut density = Field::zeros(512, 512).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| relax::splat(black_box(points), &mut density));
        });
    }
    group.finish();
}

fn bench_blur(c: &mut Criterion) {
    let mut group = c.benchmark_group("blur");
    let filter = BlurFilter::new(0.5, 0.99);
    for &size in &[128u32, 512] {
        let mut field = Field::zeros(size, size).unwrap();
        field.fill(1.0);
        let mut swap = Field::zeros(size, size).unwrap();
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| filter.apply(black_box(&mut field), &mut swap));
        });
    }
    group.finish();
}

fn bench_session_step(c: &mut Criterion) {
    let mut group = c.benchmark_group("session_step");
    let image = gradient_image(256, 256);
    for &count in &[1_000, 10_000] {
        let config = StippleConfig { num_dots: count, seed: Some(2), ..Default::default() };
        let mut session = Session::start(config, Arc::clone(&image)).unwrap();
        group.bench_function(BenchmarkId::from_parameter(count), |b| {
            b.iter(|| black_box(session.step(1.0 / 60.0)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_splat, bench_blur, bench_session_step);
criterion_main!(benches);
