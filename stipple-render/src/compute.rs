//! GPU stippler — the relaxation loop as four wgpu compute passes.
//!
//! ```text
//!  write_density   (64 / point)   points ──atomicAdd──▶ splat (u32, fixed point)
//!  blur_x          (8×8 / pixel)  fields + splat + image·inject ──▶ scratch
//!  blur_y          (8×8 / pixel)  scratch ──×decay──▶ fields, splat ← 0
//!  move_particles  (64 / point)   points += clamp(speed·dt·∇r)
//! ```
//!
//! Every pass is its own compute pass in one command encoder, so each
//! stage sees the complete output of the previous one.  All buffers are
//! owned by [`GpuStippler`] and released on drop.

use std::sync::mpsc;
use std::sync::Arc;

use bytemuck::Pod;
use log::{debug, info};
use rand::rngs::StdRng;
use stipple_core::{relax, ImageSampler, Point, PointSet, StippleConfig};
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, Buffer,
    BufferBindingType, BufferDescriptor, BufferUsages, CommandEncoderDescriptor,
    ComputePassDescriptor, ComputePipeline, ComputePipelineDescriptor, Device,
    PipelineCompilationOptions, PipelineLayoutDescriptor, ShaderModuleDescriptor,
    ShaderStages,
};

use crate::bridge;
use crate::context::{GpuContext, GpuError};
use crate::vertex::{ComputeParams, GpuPoint};

/// Threads per workgroup of the per-point passes.
pub const POINT_WORKGROUP: u32 = 64;
/// Workgroup edge of the per-pixel passes.
pub const FIELD_WORKGROUP: u32 = 8;

/// Workgroups needed to cover `items` with groups of `size`.
#[inline]
pub fn workgroups(items: u32, size: u32) -> u32 {
    items.div_ceil(size)
}

// ───────────────────────────────────────────────────────────────────
// Pipelines
// ───────────────────────────────────────────────────────────────────

/// The four compute pipelines, sharing one bind group layout.
struct StipplePipelines {
    layout: BindGroupLayout,
    write_density: ComputePipeline,
    blur_x: ComputePipeline,
    blur_y: ComputePipeline,
    move_particles: ComputePipeline,
}

fn storage_entry(binding: u32, read_only: bool) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility: ShaderStages::COMPUTE,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl StipplePipelines {
    fn new(device: &Device) -> Self {
        // ── Shader ──────────────────────────────────────────────
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("stipple_compute_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/stipple.wgsl").into()),
        });

        // ── Bind group layout ───────────────────────────────────
        let layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("stipple_compute_bgl"),
            entries: &[
                // params
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::COMPUTE,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                storage_entry(1, false), // points
                storage_entry(2, false), // fields
                storage_entry(3, false), // scratch
                storage_entry(4, false), // splat accumulator
                storage_entry(5, true),  // image
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("stipple_compute_layout"),
            bind_group_layouts: &[&layout],
            push_constant_ranges: &[],
        });

        let make = |entry_point: &str| {
            device.create_compute_pipeline(&ComputePipelineDescriptor {
                label: Some(entry_point),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry_point),
                compilation_options: PipelineCompilationOptions::default(),
                cache: None,
            })
        };

        Self {
            write_density: make("write_density"),
            blur_x: make("blur_x"),
            blur_y: make("blur_y"),
            move_particles: make("move_particles"),
            layout,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Stippler
// ───────────────────────────────────────────────────────────────────

/// A stippling session whose state lives entirely in GPU buffers.
///
/// Mirrors [`stipple_core::Session`]: same validation, same seeded initial
/// distribution, same per-frame parameters.
pub struct GpuStippler {
    config: StippleConfig,
    source: Arc<ImageSampler>,
    image: Arc<ImageSampler>,
    rng: StdRng,
    inject_scale: f32,
    num_points: u32,
    frame: u64,

    pipelines: StipplePipelines,
    bind_group: BindGroup,

    params_buffer: Buffer,
    points_buffer: Buffer,
    fields_buffer: Buffer,
    scratch_buffer: Buffer,
    splat_buffer: Buffer,
    #[allow(dead_code)]
    image_buffer: Buffer,
}

impl GpuStippler {
    /// Validate `config`, allocate every buffer and upload the image and
    /// the initial points.
    pub fn new(gpu: &GpuContext, config: StippleConfig, image: Arc<ImageSampler>) -> Result<Self, GpuError> {
        config.validate()?;
        let source = image;
        let image = config.stippled_image(&source)?;
        let (width, height) = (image.width(), image.height());

        // ── Capacity ────────────────────────────────────────────
        let cells = width as u64 * height as u64;
        let vec2 = std::mem::size_of::<[f32; 2]>() as u64;
        let word = std::mem::size_of::<u32>() as u64;
        let points_bytes = (config.num_dots.max(1) as u64) * std::mem::size_of::<GpuPoint>() as u64;
        gpu.check_storage_size("point buffer", points_bytes)?;
        gpu.check_storage_size("field buffer", cells * vec2)?;
        gpu.check_storage_size("splat buffer", cells * word)?;

        let mut rng = config.rng();
        let points = PointSet::random(config.num_dots, width, height, &mut rng)?;
        let inject_scale = relax::inject_scale(config.num_dots, &image);

        // ── Buffers ─────────────────────────────────────────────
        let device = &gpu.device;
        let storage = |label: &str, size: u64, extra: BufferUsages| {
            device.create_buffer(&BufferDescriptor {
                label: Some(label),
                size,
                usage: BufferUsages::STORAGE | BufferUsages::COPY_DST | BufferUsages::COPY_SRC | extra,
                mapped_at_creation: false,
            })
        };
        let params_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("stipple_params"),
            size: std::mem::size_of::<ComputeParams>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let points_buffer = storage("stipple_points", points_bytes, BufferUsages::VERTEX);
        let fields_buffer = storage("stipple_fields", cells * vec2, BufferUsages::empty());
        let scratch_buffer = storage("stipple_scratch", cells * vec2, BufferUsages::empty());
        let splat_buffer = storage("stipple_splat", cells * word, BufferUsages::empty());
        let image_buffer = storage("stipple_image", cells * word, BufferUsages::empty());

        gpu.queue.write_buffer(&image_buffer, 0, bytemuck::cast_slice(image.as_slice()));
        if !points.is_empty() {
            let initial = bridge::collect_points(points.as_slice());
            gpu.queue.write_buffer(&points_buffer, 0, bytemuck::cast_slice(&initial));
        }

        let pipelines = StipplePipelines::new(device);
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("stipple_compute_bg"),
            layout: &pipelines.layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: params_buffer.as_entire_binding() },
                BindGroupEntry { binding: 1, resource: points_buffer.as_entire_binding() },
                BindGroupEntry { binding: 2, resource: fields_buffer.as_entire_binding() },
                BindGroupEntry { binding: 3, resource: scratch_buffer.as_entire_binding() },
                BindGroupEntry { binding: 4, resource: splat_buffer.as_entire_binding() },
                BindGroupEntry { binding: 5, resource: image_buffer.as_entire_binding() },
            ],
        });

        info!(
            "GPU stippler started: {} dots on {}×{} ({} KiB of field buffers)",
            config.num_dots,
            width,
            height,
            (cells * (2 * vec2 + 2 * word)) / 1024
        );

        Ok(Self {
            num_points: config.num_dots as u32,
            config,
            source,
            image,
            rng,
            inject_scale,
            frame: 0,
            pipelines,
            bind_group,
            params_buffer,
            points_buffer,
            fields_buffer,
            scratch_buffer,
            splat_buffer,
            image_buffer,
        })
    }

    /// Redistribute the points uniformly at random and zero every field.
    pub fn reset(&mut self, gpu: &GpuContext) -> Result<(), GpuError> {
        let (w, h) = self.dimensions();
        let points = PointSet::random(self.config.num_dots, w, h, &mut self.rng)?;
        if !points.is_empty() {
            let fresh = bridge::collect_points(points.as_slice());
            gpu.queue.write_buffer(&self.points_buffer, 0, bytemuck::cast_slice(&fresh));
        }

        let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("stipple_reset_encoder"),
        });
        encoder.clear_buffer(&self.fields_buffer, 0, None);
        encoder.clear_buffer(&self.scratch_buffer, 0, None);
        encoder.clear_buffer(&self.splat_buffer, 0, None);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        self.frame = 0;
        info!("GPU stippler reset: {} dots", self.config.num_dots);
        Ok(())
    }

    /// Replace the configuration, reallocating everything.  On error the
    /// stippler keeps its previous state.
    pub fn reconfigure(&mut self, gpu: &GpuContext, config: StippleConfig) -> Result<(), GpuError> {
        let next = Self::new(gpu, config, Arc::clone(&self.source))?;
        *self = next;
        Ok(())
    }

    /// Release the GPU buffers.  Equivalent to dropping.
    pub fn stop(self) {
        debug!("GPU stippler stopped after {} frames", self.frame);
    }

    /// Encode and submit one frame.  Returns the index of the frame run.
    pub fn step(&mut self, gpu: &GpuContext, dt: f32) -> u64 {
        let (w, h) = self.dimensions();
        let params = bridge::compute_params(&self.config, self.inject_scale, w, h, self.num_points, self.frame, dt);
        gpu.queue.write_buffer(&self.params_buffer, 0, bytemuck::bytes_of(&params));

        let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("stipple_step_encoder"),
        });
        self.encode_step(&mut encoder);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let frame = self.frame;
        self.frame += 1;
        frame
    }

    /// Record the four passes.  The params buffer must already hold this
    /// frame's uniforms.
    fn encode_step(&self, encoder: &mut wgpu::CommandEncoder) {
        let (w, h) = self.dimensions();
        let point_groups = workgroups(self.num_points, POINT_WORKGROUP);
        let (gx, gy) = (workgroups(w, FIELD_WORKGROUP), workgroups(h, FIELD_WORKGROUP));

        let stages: [(&str, &ComputePipeline, (u32, u32)); 4] = [
            ("write_density", &self.pipelines.write_density, (point_groups, 1)),
            ("blur_x", &self.pipelines.blur_x, (gx, gy)),
            ("blur_y", &self.pipelines.blur_y, (gx, gy)),
            ("move_particles", &self.pipelines.move_particles, (point_groups, 1)),
        ];

        for (label, pipeline, (x, y)) in stages {
            if x == 0 || y == 0 {
                continue;
            }
            let mut pass = encoder.begin_compute_pass(&ComputePassDescriptor {
                label: Some(label),
                timestamp_writes: None,
            });
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &self.bind_group, &[]);
            pass.dispatch_workgroups(x, y, 1);
        }
    }

    // ───────────────────── Readback ───────────────────────────────

    /// Copy the current point positions back to the CPU.  Blocks.
    pub fn read_points(&self, gpu: &GpuContext) -> Result<Vec<Point>, GpuError> {
        let raw: Vec<GpuPoint> = read_buffer(gpu, &self.points_buffer, self.num_points as usize)?;
        Ok(raw.into_iter().map(Point::from).collect())
    }

    /// Copy `(density, target)` per pixel back to the CPU.  Blocks.
    pub fn read_fields(&self, gpu: &GpuContext) -> Result<Vec<[f32; 2]>, GpuError> {
        let (w, h) = self.dimensions();
        read_buffer(gpu, &self.fields_buffer, w as usize * h as usize)
    }

    // ───────────────────── Accessors ──────────────────────────────

    /// Point positions, usable as a `GpuPoint` instance buffer.
    pub fn points_buffer(&self) -> &Buffer {
        &self.points_buffer
    }

    /// Interleaved `(density, target)` per pixel.
    pub fn fields_buffer(&self) -> &Buffer {
        &self.fields_buffer
    }

    pub fn num_points(&self) -> u32 {
        self.num_points
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn config(&self) -> &StippleConfig {
        &self.config
    }

    pub fn image(&self) -> &ImageSampler {
        &self.image
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.image.width(), self.image.height())
    }

    /// `ρ_ref` of the most recently computed frame; zero before the first.
    pub fn reference_density(&self) -> f32 {
        let (w, h) = self.dimensions();
        relax::reference_density(self.config.num_dots, w, h, self.config.decay, self.frame)
    }
}

/// Copy the first `len` elements of `src` into a staging buffer and map it.
fn read_buffer<T: Pod>(gpu: &GpuContext, src: &Buffer, len: usize) -> Result<Vec<T>, GpuError> {
    if len == 0 {
        return Ok(Vec::new());
    }
    let size = (len * std::mem::size_of::<T>()) as u64;
    let staging = gpu.device.create_buffer(&BufferDescriptor {
        label: Some("stipple_readback"),
        size,
        usage: BufferUsages::MAP_READ | BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu.device.create_command_encoder(&CommandEncoderDescriptor {
        label: Some("stipple_readback_encoder"),
    });
    encoder.copy_buffer_to_buffer(src, 0, &staging, 0, size);
    gpu.queue.submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (tx, rx) = mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    let _ = gpu.device.poll(wgpu::Maintain::Wait);
    rx.recv().map_err(|_| GpuError::ReadbackLost)??;

    let data = slice.get_mapped_range();
    let out = bytemuck::cast_slice::<u8, T>(&data).to_vec();
    drop(data);
    staging.unmap();
    Ok(out)
}

// ===================================================================
// Tests
// ===================================================================
