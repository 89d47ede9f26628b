//! Dot render pipeline — instanced rendering of the point set as discs.
//!
//! One draw call renders every point.  The instance buffer holds
//! `GpuPoint`s, filled either by a CPU upload or by a buffer-to-buffer
//! copy from the compute stippler.

use stipple_core::MAX_DOTS;
use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayoutDescriptor,
    BindGroupLayoutEntry, BindingType, BlendState, Buffer, BufferBindingType,
    BufferDescriptor, BufferUsages, ColorTargetState, ColorWrites, CommandEncoder,
    Device, FragmentState, FrontFace, IndexFormat, MultisampleState,
    PipelineCompilationOptions, PipelineLayoutDescriptor, PolygonMode,
    PrimitiveState, PrimitiveTopology, Queue, RenderPass, RenderPipeline,
    RenderPipelineDescriptor, ShaderModuleDescriptor, ShaderStages, TextureFormat,
    VertexState,
};

use crate::vertex::{CameraUniform, DotUniform, GpuPoint, QuadVertex};

/// Owns the wgpu pipeline, buffers, and bind group for dot rendering.
pub struct DotPipeline {
    pipeline: RenderPipeline,

    // Geometry
    vertex_buffer: Buffer,
    index_buffer: Buffer,

    // Instancing
    instance_buffer: Buffer,
    instance_count: u32,

    // Camera + style
    camera_buffer: Buffer,
    style_buffer: Buffer,
    bind_group: BindGroup,
}

fn uniform_entry(binding: u32, visibility: ShaderStages) -> BindGroupLayoutEntry {
    BindGroupLayoutEntry {
        binding,
        visibility,
        ty: BindingType::Buffer {
            ty: BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

impl DotPipeline {
    /// Create the pipeline and allocate room for `MAX_DOTS` instances.
    pub fn new(device: &Device, surface_format: TextureFormat) -> Self {
        // ── Shader ──────────────────────────────────────────────
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("dots_shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../shaders/dots.wgsl").into(),
            ),
        });

        // ── Bind group layout: camera + style ───────────────────
        let bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("dots_bgl"),
            entries: &[
                uniform_entry(0, ShaderStages::VERTEX),
                uniform_entry(1, ShaderStages::VERTEX | ShaderStages::FRAGMENT),
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("dots_pipeline_layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        // ── Render pipeline ─────────────────────────────────────
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("dots_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[QuadVertex::layout(), GpuPoint::layout()],
            },
            fragment: Some(FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                targets: &[Some(ColorTargetState {
                    format: surface_format,
                    blend: Some(BlendState::ALPHA_BLENDING),
                    write_mask: ColorWrites::ALL,
                })],
            }),
            primitive: PrimitiveState {
                topology: PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        // ── Buffers ─────────────────────────────────────────────
        let vertex_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("dots_quad_vb"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("dots_quad_ib"),
            size: std::mem::size_of::<[u16; 6]>() as u64,
            usage: BufferUsages::INDEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let instance_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("dots_instances"),
            size: (MAX_DOTS * std::mem::size_of::<GpuPoint>()) as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("dots_camera_ub"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let style_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("dots_style_ub"),
            size: std::mem::size_of::<DotUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("dots_bg"),
            layout: &bgl,
            entries: &[
                BindGroupEntry { binding: 0, resource: camera_buffer.as_entire_binding() },
                BindGroupEntry { binding: 1, resource: style_buffer.as_entire_binding() },
            ],
        });

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            instance_buffer,
            instance_count: 0,
            camera_buffer,
            style_buffer,
            bind_group,
        }
    }

    // ───────────────────── Upload ─────────────────────────────────

    /// Upload the static quad geometry.  Call once after creation.
    pub fn upload_quad(&self, queue: &Queue) {
        queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&QuadVertex::VERTICES));
        queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&QuadVertex::INDICES));
    }

    /// Upload CPU-side points.  Returns the number that will be drawn.
    pub fn upload_points(&mut self, queue: &Queue, points: &[GpuPoint]) -> u32 {
        let count = points.len().min(MAX_DOTS);
        if count > 0 {
            queue.write_buffer(&self.instance_buffer, 0, bytemuck::cast_slice(&points[..count]));
        }
        self.instance_count = count as u32;
        self.instance_count
    }

    /// Record a copy of `count` points out of a GPU buffer laid out as
    /// `GpuPoint`s.  `source` is only read.
    pub fn copy_points(&mut self, encoder: &mut CommandEncoder, source: &Buffer, count: u32) -> u32 {
        let count = count.min(MAX_DOTS as u32);
        if count > 0 {
            let bytes = count as u64 * std::mem::size_of::<GpuPoint>() as u64;
            encoder.copy_buffer_to_buffer(source, 0, &self.instance_buffer, 0, bytes);
        }
        self.instance_count = count;
        count
    }

    pub fn upload_camera(&self, queue: &Queue, camera: &CameraUniform) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));
    }

    pub fn upload_style(&self, queue: &Queue, style: &DotUniform) {
        queue.write_buffer(&self.style_buffer, 0, bytemuck::bytes_of(style));
    }

    // ───────────────────── Draw ───────────────────────────────────

    /// Record one instanced draw for all points.
    pub fn draw<'a>(&'a self, pass: &mut RenderPass<'a>) {
        if self.instance_count == 0 {
            return;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_vertex_buffer(1, self.instance_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint16);
        pass.draw_indexed(0..6, 0, 0..self.instance_count);
    }

    pub fn instance_count(&self) -> u32 {
        self.instance_count
    }
}
