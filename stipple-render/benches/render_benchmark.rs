//! Benchmarks for stipple-render buffer preparation and GPU stepping.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use stipple_core::{ImageSampler, Session, StippleConfig};
use stipple_render::bridge::{compute_params, interleave_fields};
use stipple_render::{collect_points, CameraUniform, GpuContext, GpuStippler};

fn ramp_image(w: u32, h: u32) -> Arc<ImageSampler> {
    let data = (0..w * h).map(|k| (k % w) as f32 / w as f32).collect();
    Arc::new(ImageSampler::from_luma(w, h, data).unwrap())
}

fn bench_collect_points(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect_points");
    let image = ramp_image(256, 256);
    for &count in &[100, 1_000, 10_000] {
        let config = StippleConfig { num_dots: count, seed: Some(3), ..Default::default() };
        let points = Session::start(config, Arc::clone(&image)).unwrap().points().to_vec();
        group.bench_with_input(BenchmarkId::from_parameter(count), &points, |b, points| {
            b.iter(|| black_box(collect_points(black_box(points))));
        });
    }
    group.finish();
}

fn bench_interleave_fields(c: &mut Criterion) {
    let image = ramp_image(512, 512);
    let mut session = Session::start(StippleConfig { num_dots: 1_000, ..Default::default() }, image).unwrap();
    session.step(1.0 / 60.0);
    c.bench_function("interleave_fields 512x512", |b| {
        b.iter(|| black_box(interleave_fields(session.density(), session.target())));
    });
}

fn bench_compute_params(c: &mut Criterion) {
    let config = StippleConfig::default();
    c.bench_function("compute_params", |b| {
        b.iter(|| {
            black_box(compute_params(
                black_box(&config),
                black_box(0.01),
                512,
                512,
                4_000,
                black_box(120),
                black_box(1.0 / 60.0),
            ))
        });
    });
}

fn bench_camera_fit(c: &mut Criterion) {
    c.bench_function("CameraUniform::fit_image", |b| {
        b.iter(|| {
            black_box(CameraUniform::fit_image(
                black_box(1280.0),
                black_box(720.0),
                black_box(512.0),
                black_box(384.0),
            ))
        });
    });
}

fn bench_gpu_step(c: &mut Criterion) {
    let Ok(gpu) = pollster::block_on(GpuContext::new_headless()) else {
        eprintln!("no GPU adapter, skipping gpu_step");
        return;
    };
    let image = ramp_image(512, 512);
    let config = StippleConfig { num_dots: 10_000, seed: Some(1), ..Default::default() };
    let Ok(mut stippler) = GpuStippler::new(&gpu, config, image) else { return };

    c.bench_function("gpu_step 512x512 10k", |b| {
        b.iter(|| {
            stippler.step(&gpu, 1.0 / 60.0);
            gpu.device.poll(wgpu::Maintain::Wait);
        });
    });
}

criterion_group!(
    benches,
    bench_collect_points,
    bench_interleave_fields,
    bench_compute_params,
    bench_camera_fit,
    bench_gpu_step,
);
criterion_main!(benches);
