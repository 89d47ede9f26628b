//! Dense 2-D `f32` grids and the density/target/swap triple a session owns.
//!
//! Pixel `(i, j)` covers `[i, i+1) × [j, j+1)` with its center at
//! `(i + 0.5, j + 0.5)`.  Every continuous lookup (bilinear sample, splat,
//! gradient) uses clamp-to-edge addressing, so a splat deposits exactly its
//! weight into the grid no matter where the point sits.

use crate::error::{try_zeroed, StippleError};

/// Four `(index, weight)` pairs of a bilinear footprint.  Weights sum to 1.
pub(crate) type Taps = [(usize, f32); 4];

/// The two columns, two rows and fractional offsets a bilinear lookup at a
/// continuous position touches, already clamped to the grid.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Footprint {
    pub i: [usize; 2],
    pub j: [usize; 2],
    pub tx: f32,
    pub ty: f32,
}

impl Footprint {
    #[inline]
    pub(crate) fn new(x: f32, y: f32, width: u32, height: u32) -> Self {
        let fx = x - 0.5;
        let fy = y - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();

        let max_i = width as i64 - 1;
        let max_j = height as i64 - 1;
        Self {
            i: [
                (x0 as i64).clamp(0, max_i) as usize,
                (x0 as i64 + 1).clamp(0, max_i) as usize,
            ],
            j: [
                (y0 as i64).clamp(0, max_j) as usize,
                (y0 as i64 + 1).clamp(0, max_j) as usize,
            ],
            tx: fx - x0,
            ty: fy - y0,
        }
    }

    /// `((i, j), weight)` for the four corners.
    #[inline]
    pub(crate) fn corners(&self) -> [((usize, usize), f32); 4] {
        let (tx, ty) = (self.tx, self.ty);
        [
            ((self.i[0], self.j[0]), (1.0 - tx) * (1.0 - ty)),
            ((self.i[1], self.j[0]), tx * (1.0 - ty)),
            ((self.i[0], self.j[1]), (1.0 - tx) * ty),
            ((self.i[1], self.j[1]), tx * ty),
        ]
    }
}

/// Bilinear footprint of the continuous position `(x, y)` on a
/// `width × height` grid, as flat indices.
#[inline]
pub(crate) fn bilinear_taps(x: f32, y: f32, width: u32, height: u32) -> Taps {
    let w = width as usize;
    Footprint::new(x, y, width, height)
        .corners()
        .map(|((i, j), weight)| (j * w + i, weight))
}

/// A row-major `width × height` grid of `f32`.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

impl Field {
    /// Allocate a zeroed field.  Allocation failure is reported, not fatal.
    pub fn zeros(width: u32, height: u32) -> Result<Self, StippleError> {
        let data = try_zeroed("field", width as usize * height as usize)?;
        Ok(Self { width, height, data })
    }

    /// Wrap existing row-major data.  Callers guarantee the length.
    pub(crate) fn from_vec(width: u32, height: u32, data: Vec<f32>) -> Self {
        debug_assert_eq!(data.len(), width as usize * height as usize);
        Self { width, height, data }
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [f32] {
        &mut self.data
    }

    #[inline]
    pub fn index(&self, i: u32, j: u32) -> usize {
        j as usize * self.width as usize + i as usize
    }

    #[inline]
    pub fn get(&self, i: u32, j: u32) -> f32 {
        self.data[self.index(i, j)]
    }

    #[inline]
    pub fn set(&mut self, i: u32, j: u32, value: f32) {
        let idx = self.index(i, j);
        self.data[idx] = value;
    }

    /// Read with clamp-to-edge addressing.
    #[inline]
    pub fn get_clamped(&self, i: i64, j: i64) -> f32 {
        let i = i.clamp(0, self.width as i64 - 1) as usize;
        let j = j.clamp(0, self.height as i64 - 1) as usize;
        self.data[j * self.width as usize + i]
    }

    pub fn fill(&mut self, value: f32) {
        self.data.fill(value);
    }

    pub fn scale(&mut self, factor: f32) {
        for v in &mut self.data {
            *v *= factor;
        }
    }

    /// Sum in `f64` so large fields do not lose small contributions.
    pub fn sum(&self) -> f64 {
        self.data.iter().map(|&v| v as f64).sum()
    }

    pub fn mean(&self) -> f64 {
        if self.data.is_empty() {
            0.0
        } else {
            self.sum() / self.data.len() as f64
        }
    }

    pub fn max(&self) -> f32 {
        self.data.iter().copied().fold(0.0, f32::max)
    }

    /// Bilinear lookup at a continuous position.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        bilinear_taps(x, y, self.width, self.height)
            .iter()
            .map(|&(idx, w)| self.data[idx] * w)
            .sum()
    }

    /// Deposit `weight` at `(x, y)`, spread over the four nearest pixels.
    #[inline]
    pub fn splat(&mut self, x: f32, y: f32, weight: f32) {
        for (idx, w) in bilinear_taps(x, y, self.width, self.height) {
            self.data[idx] += weight * w;
        }
    }

    /// Add `scale · other` element-wise.  Both fields share dimensions.
    pub fn add_scaled(&mut self, other: &Field, scale: f32) {
        debug_assert_eq!((self.width, self.height), (other.width, other.height));
        for (dst, &src) in self.data.iter_mut().zip(&other.data) {
            *dst += src * scale;
        }
    }
}

/// The per-session grids: current density, diffused target, and the
/// ping-pong scratch buffer the blur writes through.
#[derive(Clone, Debug)]
pub struct DensityField {
    pub density: Field,
    pub target: Field,
    pub swap: Field,
}

impl DensityField {
    pub fn new(width: u32, height: u32) -> Result<Self, StippleError> {
        Ok(Self {
            density: Field::zeros(width, height)?,
            target: Field::zeros(width, height)?,
            swap: Field::zeros(width, height)?,
        })
    }

    pub fn width(&self) -> u32 {
        self.density.width()
    }

    pub fn height(&self) -> u32 {
        self.density.height()
    }
}

// ===================================================================
// Tests
// ===================================================================
