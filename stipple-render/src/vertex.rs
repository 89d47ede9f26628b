//! GPU vertex, instance, and uniform data types for the stippler.
//!
//! All types derive `bytemuck::Pod` + `Zeroable` for zero-copy upload
//! to GPU buffers.  Uniform structs are padded to 16-byte multiples so
//! their Rust layout matches WGSL's uniform address space.

use bytemuck::{Pod, Zeroable};
use stipple_core::Point;
use wgpu::{BufferAddress, VertexAttribute, VertexBufferLayout, VertexFormat, VertexStepMode};

// ───────────────────────────────────────────────────────────────────
// Vertex (unit quad)
// ───────────────────────────────────────────────────────────────────

/// A single vertex of the unit quad (0,0)→(1,1).
///
/// Shared by every dot instance and by the overlay planes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct QuadVertex {
    /// Position in [0, 1] space.
    pub position: [f32; 2],
}

impl QuadVertex {
    pub const VERTICES: [QuadVertex; 4] = [
        QuadVertex { position: [0.0, 0.0] }, // top-left
        QuadVertex { position: [1.0, 0.0] }, // top-right
        QuadVertex { position: [0.0, 1.0] }, // bottom-left
        QuadVertex { position: [1.0, 1.0] }, // bottom-right
    ];

    pub const INDICES: [u16; 6] = [0, 1, 2, 2, 1, 3];

    pub fn layout() -> VertexBufferLayout<'static> {
        static ATTRS: &[VertexAttribute] = &[
            // location(0) = position
            VertexAttribute {
                offset: 0,
                shader_location: 0,
                format: VertexFormat::Float32x2,
            },
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as BufferAddress,
            step_mode: VertexStepMode::Vertex,
            attributes: ATTRS,
        }
    }
}

// ───────────────────────────────────────────────────────────────────
// Point instance
// ───────────────────────────────────────────────────────────────────

/// One dot, in image-pixel space.
///
/// 8 bytes.  The same layout backs the compute shader's
/// `array<vec2<f32>>` and the dot pipeline's instance buffer, so the
/// compute output can be copied straight into the draw.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct GpuPoint {
    pub position: [f32; 2],
}

impl GpuPoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { position: [x, y] }
    }

    pub fn layout() -> VertexBufferLayout<'static> {
        static ATTRS: &[VertexAttribute] = &[
            // location(1) = center
            VertexAttribute {
                offset: 0,
                shader_location: 1,
                format: VertexFormat::Float32x2,
            },
        ];
        VertexBufferLayout {
            array_stride: std::mem::size_of::<GpuPoint>() as BufferAddress,
            step_mode: VertexStepMode::Instance,
            attributes: ATTRS,
        }
    }
}

impl From<Point> for GpuPoint {
    fn from(p: Point) -> Self {
        Self::new(p.x, p.y)
    }
}

impl From<GpuPoint> for Point {
    fn from(p: GpuPoint) -> Self {
        Point::new(p.position[0], p.position[1])
    }
}

// ───────────────────────────────────────────────────────────────────
// Camera uniform
// ───────────────────────────────────────────────────────────────────

/// Camera/viewport uniform sent to the GPU once per frame.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct CameraUniform {
    /// 4×4 orthographic projection matrix (column-major).
    pub view_proj: [[f32; 4]; 4],
}

impl CameraUniform {
    /// Orthographic projection of a `width × height` pixel viewport whose
    /// top-left corner shows world point `(pan_x, pan_y)` at `zoom`.
    ///
    /// Y grows downward, matching image rows.
    pub fn orthographic(width: f32, height: f32, pan_x: f32, pan_y: f32, zoom: f32) -> Self {
        // ndc_x = (world_x - pan_x) * (2 * zoom / width) - 1
        // ndc_y = 1 - (world_y - pan_y) * (2 * zoom / height)
        let sx = 2.0 * zoom / width;
        let sy = -2.0 * zoom / height;
        let tx = -pan_x * sx - 1.0;
        let ty = -pan_y * sy + 1.0;

        Self {
            view_proj: [
                [sx,  0.0, 0.0, 0.0],
                [0.0, sy,  0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [tx,  ty,  0.0, 1.0],
            ],
        }
    }

    /// Fit a whole `image_w × image_h` image into the viewport, centered,
    /// aspect ratio preserved.
    pub fn fit_image(viewport_w: f32, viewport_h: f32, image_w: f32, image_h: f32) -> Self {
        if viewport_w <= 0.0 || viewport_h <= 0.0 || image_w <= 0.0 || image_h <= 0.0 {
            return Self::orthographic(viewport_w.max(1.0), viewport_h.max(1.0), 0.0, 0.0, 1.0);
        }
        let zoom = (viewport_w / image_w).min(viewport_h / image_h);
        let pan_x = 0.5 * (image_w - viewport_w / zoom);
        let pan_y = 0.5 * (image_h - viewport_h / zoom);
        Self::orthographic(viewport_w, viewport_h, pan_x, pan_y, zoom)
    }

    /// Project a world point to NDC.
    pub fn project(&self, x: f32, y: f32) -> [f32; 2] {
        let m = &self.view_proj;
        [
            x * m[0][0] + y * m[1][0] + m[3][0],
            x * m[0][1] + y * m[1][1] + m[3][1],
        ]
    }
}

// ───────────────────────────────────────────────────────────────────
// Pipeline uniforms
// ───────────────────────────────────────────────────────────────────

/// Disc appearance.  32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct DotUniform {
    pub color: [f32; 4],
    /// Disc diameter in image pixels.
    pub dot_size: f32,
    pub _pad: [f32; 3],
}

impl DotUniform {
    pub fn new(dot_size: f32, color: [f32; 4]) -> Self {
        Self { color, dot_size, _pad: [0.0; 3] }
    }
}

/// Which channel of an overlay's `vec2` buffer is displayed.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OverlayChannel {
    /// `.x`: image intensity, or accumulated density.
    Primary = 0,
    /// `.y`: diffused target.
    Secondary = 1,
}

/// One overlay plane's parameters.  32 bytes.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct OverlayUniform {
    /// Color at value 1; alpha scales with the value.
    pub tint: [f32; 4],
    pub width: u32,
    pub height: u32,
    pub channel: u32,
    /// Multiplier applied before clamping to `[0, 1]`.
    pub scale: f32,
}

impl OverlayUniform {
    pub fn new(width: u32, height: u32, channel: OverlayChannel, scale: f32, tint: [f32; 4]) -> Self {
        Self { tint, width, height, channel: channel as u32, scale }
    }
}

/// Per-frame parameters of the compute passes.  64 bytes.
///
/// Mirrors `Params` in `stipple.wgsl`.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct ComputeParams {
    pub width: u32,
    pub height: u32,
    pub num_points: u32,
    pub _pad0: u32,
    /// Blur taps `k0, k1, k2` and `decay`.
    pub taps: [f32; 4],
    pub inject_scale: f32,
    /// `1 / ρ_ref`, or 0 before any mass has accumulated.
    pub inv_reference: f32,
    /// `speed · dt`.
    pub gain: f32,
    pub max_step: f32,
    /// Largest in-bounds coordinate per axis.
    pub bound: [f32; 2],
    pub _pad1: [f32; 2],
}

// ===================================================================
// Tests
// ===================================================================
