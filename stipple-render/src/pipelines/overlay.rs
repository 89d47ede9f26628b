//! Overlay render pipeline — debug planes drawn beneath the dots.
//!
//! Two planes share one pipeline and the unit quad:
//!
//! - **image**: the stippled intensity, uploaded once and drawn in the
//!   dot ink color, so it reads the same way as the dots.
//! - **density**: `(density, target)` per pixel, refreshed every frame
//!   from either the CPU session or the GPU field buffer.
//!
//! Each plane reads a `vec2<f32>` storage buffer in the fragment shader,
//! so neither needs a texture.

use wgpu::{
    BindGroup, BindGroupDescriptor, BindGroupEntry, BindGroupLayout,
    BindGroupLayoutDescriptor, BindGroupLayoutEntry, BindingType, BlendState,
    Buffer, BufferBindingType, BufferDescriptor, BufferUsages, ColorTargetState,
    ColorWrites, CommandEncoder, Device, FragmentState, FrontFace, IndexFormat,
    MultisampleState, PipelineCompilationOptions, PipelineLayoutDescriptor,
    PolygonMode, PrimitiveState, PrimitiveTopology, Queue, RenderPass,
    RenderPipeline, RenderPipelineDescriptor, ShaderModuleDescriptor,
    ShaderStages, TextureFormat, VertexState,
};

use crate::vertex::{CameraUniform, OverlayChannel, OverlayUniform, QuadVertex};

/// Image plane tint until the renderer sets the ink color.
const IMAGE_TINT: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
/// Translucent orange for accumulated density.
const DENSITY_TINT: [f32; 4] = [1.0, 0.45, 0.1, 0.7];

/// One plane's value buffer, uniform and bind group.
struct OverlayPlane {
    values: Buffer,
    uniform_buffer: Buffer,
    uniform: OverlayUniform,
    bind_group: BindGroup,
}

impl OverlayPlane {
    fn new(device: &Device, layout: &BindGroupLayout, label: &str, uniform: OverlayUniform) -> Self {
        let cells = uniform.width as u64 * uniform.height as u64;
        let values = device.create_buffer(&BufferDescriptor {
            label: Some(label),
            size: cells * std::mem::size_of::<[f32; 2]>() as u64,
            usage: BufferUsages::STORAGE | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("overlay_plane_ub"),
            size: std::mem::size_of::<OverlayUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("overlay_plane_bg"),
            layout,
            entries: &[
                BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                BindGroupEntry { binding: 1, resource: values.as_entire_binding() },
            ],
        });
        Self { values, uniform_buffer, uniform, bind_group }
    }

    fn upload_uniform(&self, queue: &Queue) {
        queue.write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(&self.uniform));
    }
}

/// Owns the overlay pipeline and both planes.
pub struct OverlayPipeline {
    pipeline: RenderPipeline,
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    camera_buffer: Buffer,
    camera_bind_group: BindGroup,
    image: OverlayPlane,
    density: OverlayPlane,
}

impl OverlayPipeline {
    /// Create the pipeline with planes sized for a `width × height` image.
    pub fn new(device: &Device, surface_format: TextureFormat, width: u32, height: u32) -> Self {
        // ── Shader ──────────────────────────────────────────────
        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("overlay_shader"),
            source: wgpu::ShaderSource::Wgsl(
                include_str!("../shaders/overlay.wgsl").into(),
            ),
        });

        // ── Camera bind group layout (group 0) ──────────────────
        let camera_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("overlay_camera_bgl"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        // ── Plane bind group layout (group 1) ───────────────────
        let plane_bgl = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("overlay_plane_bgl"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("overlay_pipeline_layout"),
            bind_group_layouts: &[&camera_bgl, &plane_bgl],
            push_constant_ranges: &[],
        });

        // ── Render pipeline ─────────────────────────────────────
        let pipeline = device.create_render_pipeline(&RenderPipelineDescriptor {
            label: Some("overlay_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                compilation_options: PipelineCompilationOptions::default(),
                buffers: &[QuadVertex::layout()],
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
            label: Some("overlay_quad_vb"),
            size: std::mem::size_of::<[QuadVertex; 4]>() as u64,
            usage: BufferUsages::VERTEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let index_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("overlay_quad_ib"),
            size: std::mem::size_of::<[u16; 6]>() as u64,
            usage: BufferUsages::INDEX | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("overlay_camera_ub"),
            size: std::mem::size_of::<CameraUniform>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let camera_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("overlay_camera_bg"),
            layout: &camera_bgl,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let image = OverlayPlane::new(
            device,
            &plane_bgl,
            "overlay_image_values",
            OverlayUniform::new(width, height, OverlayChannel::Primary, 1.0, IMAGE_TINT),
        );
        let density = OverlayPlane::new(
            device,
            &plane_bgl,
            "overlay_density_values",
            OverlayUniform::new(width, height, OverlayChannel::Primary, 0.0, DENSITY_TINT),
        );

        Self {
            pipeline,
            vertex_buffer,
            index_buffer,
            camera_buffer,
            camera_bind_group,
            image,
            density,
        }
    }

    // ───────────────────── Upload ─────────────────────────────────

    /// Upload quad geometry and both plane uniforms.  Call once.
    pub fn upload_static(&self, queue: &Queue) {
        queue.write_buffer(&self.vertex_buffer, 0, bytemuck::cast_slice(&QuadVertex::VERTICES));
        queue.write_buffer(&self.index_buffer, 0, bytemuck::cast_slice(&QuadVertex::INDICES));
        self.image.upload_uniform(queue);
        self.density.upload_uniform(queue);
    }

    pub fn upload_camera(&self, queue: &Queue, camera: &CameraUniform) {
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::bytes_of(camera));
    }

    /// Image plane values, one `vec2` per pixel.
    pub fn upload_image(&self, queue: &Queue, values: &[[f32; 2]]) {
        queue.write_buffer(&self.image.values, 0, bytemuck::cast_slice(values));
    }

    /// Density plane values from the CPU, `(density, target)` per pixel.
    pub fn upload_density(&self, queue: &Queue, values: &[[f32; 2]]) {
        queue.write_buffer(&self.density.values, 0, bytemuck::cast_slice(values));
    }

    /// Record a copy of the GPU field buffer into the density plane.
    pub fn copy_density(&self, encoder: &mut CommandEncoder, source: &Buffer) {
        encoder.copy_buffer_to_buffer(source, 0, &self.density.values, 0, self.density.values.size());
    }

    /// Set the ink color the image plane is drawn in.
    pub fn set_image_tint(&mut self, queue: &Queue, tint: [f32; 4]) {
        if self.image.uniform.tint != tint {
            self.image.uniform.tint = tint;
            self.image.upload_uniform(queue);
        }
    }

    /// Set the density plane's display scale and channel.
    pub fn set_density_display(&mut self, queue: &Queue, scale: f32, channel: OverlayChannel) {
        self.density.uniform.scale = scale;
        self.density.uniform.channel = channel as u32;
        self.density.upload_uniform(queue);
    }

    // ───────────────────── Draw ───────────────────────────────────

    /// Record the enabled planes, image first.  Returns the draw calls made.
    pub fn draw<'a>(&'a self, pass: &mut RenderPass<'a>, image: bool, density: bool) -> u32 {
        if !image && !density {
            return 0;
        }

        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);
        pass.set_vertex_buffer(0, self.vertex_buffer.slice(..));
        pass.set_index_buffer(self.index_buffer.slice(..), IndexFormat::Uint16);

        let mut calls = 0;
        for plane in [(image, &self.image), (density, &self.density)]
            .into_iter()
            .filter_map(|(on, plane)| on.then_some(plane))
        {
            pass.set_bind_group(1, &plane.bind_group, &[]);
            pass.draw_indexed(0..6, 0, 0..1);
            calls += 1;
        }
        calls
    }
}
