//! Separable blur with decay.
//!
//! One frame runs a horizontal pass (field → swap) and a vertical pass
//! (swap → field).  Each pass convolves with the 3-tap kernel
//! `[b/4, 1 − b/2, b/4]`, the binomial `[1/4, 1/2, 1/4]` blended with the
//! identity by the blur strength `b`.  The vertical pass also multiplies by
//! `decay`, so one frame applies `decay · (k ⊗ k)`.
//!
//! Borders replicate the edge pixel.  With that addressing each pass
//! conserves the field's total mass, which keeps the density and target
//! fields directly comparable.

use crate::field::Field;

/// The binomial kernel blended in at full strength.
pub const BINOMIAL: [f32; 3] = [0.25, 0.5, 0.25];

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BlurFilter {
    /// Blend factor in `[0, 1]`; 0 leaves the field unblurred.
    pub strength: f32,
    /// Per-frame multiplier in `[0.9, 1]`.
    pub decay: f32,
}

impl BlurFilter {
    pub fn new(strength: f32, decay: f32) -> Self {
        Self { strength, decay }
    }

    /// The effective 1-D kernel of one pass.
    #[inline]
    pub fn taps(&self) -> [f32; 3] {
        let b = self.strength;
        [b * BINOMIAL[0], 1.0 - b + b * BINOMIAL[1], b * BINOMIAL[2]]
    }

    /// The 2-D kernel one full frame applies, `decay · k kᵀ`, indexed
    /// `[dy + 1][dx + 1]`.
    pub fn kernel_2d(&self) -> [[f32; 3]; 3] {
        let k = self.taps();
        let mut out = [[0.0; 3]; 3];
        for (row, &ky) in out.iter_mut().zip(&k) {
            for (cell, &kx) in row.iter_mut().zip(&k) {
                *cell = self.decay * ky * kx;
            }
        }
        out
    }

    /// Horizontal pass: `dst = gain · (k ∗ₓ src)`.
    pub fn horizontal(&self, src: &Field, dst: &mut Field, gain: f32) {
        debug_assert_eq!((src.width(), src.height()), (dst.width(), dst.height()));
        let [k0, k1, k2] = self.taps();
        let (w, h) = (src.width() as usize, src.height() as usize);
        let input = src.as_slice();
        let output = dst.as_mut_slice();

        for j in 0..h {
            let row = &input[j * w..(j + 1) * w];
            let out = &mut output[j * w..(j + 1) * w];
            for i in 0..w {
                let left = row[i.saturating_sub(1)];
                let right = row[(i + 1).min(w - 1)];
                out[i] = gain * (k0 * left + k1 * row[i] + k2 * right);
            }
        }
    }

    /// Vertical pass: `dst = gain · (k ∗ᵧ src)`.
    pub fn vertical(&self, src: &Field, dst: &mut Field, gain: f32) {
        debug_assert_eq!((src.width(), src.height()), (dst.width(), dst.height()));
        let [k0, k1, k2] = self.taps();
        let (w, h) = (src.width() as usize, src.height() as usize);
        let input = src.as_slice();
        let output = dst.as_mut_slice();

        for j in 0..h {
            let up = &input[j.saturating_sub(1) * w..][..w];
            let mid = &input[j * w..][..w];
            let down = &input[(j + 1).min(h - 1) * w..][..w];
            let out = &mut output[j * w..(j + 1) * w];
            for i in 0..w {
                out[i] = gain * (k0 * up[i] + k1 * mid[i] + k2 * down[i]);
            }
        }
    }

    /// Both passes in place: `field → swap → field`, decaying once.
    pub fn apply(&self, field: &mut Field, swap: &mut Field) {
        self.horizontal(field, swap, 1.0);
        self.vertical(swap, field, self.decay);
    }
}

// ===================================================================
// Tests
// ===================================================================
