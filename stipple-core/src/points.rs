//! The fixed population of dots being redistributed.

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, StippleError};

/// A position in image-pixel space.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    #[inline]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// Largest `f32` strictly below `extent`.  Positions are clamped to
/// `[0, upper_bound(extent)]` so they always stay inside `[0, extent)`.
#[inline]
pub fn upper_bound(extent: u32) -> f32 {
    let e = extent as f32;
    if e <= 0.0 {
        0.0
    } else {
        f32::from_bits(e.to_bits() - 1)
    }
}

/// An ordered, fixed-length set of points bounded by a `width × height`
/// image.  The length never changes after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct PointSet {
    points: Vec<Point>,
    width: u32,
    height: u32,
}

impl PointSet {
    /// `count` points drawn uniformly from `[0, width) × [0, height)`.
    pub fn random<R: Rng + ?Sized>(
        count: usize,
        width: u32,
        height: u32,
        rng: &mut R,
    ) -> Result<Self, StippleError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyImage { width, height }.into());
        }
        let mut points = Vec::new();
        points
            .try_reserve_exact(count)
            .map_err(|_| StippleError::ResourceExhausted { what: "point set", requested: count })?;

        let (w, h) = (width as f32, height as f32);
        let (max_x, max_y) = (upper_bound(width), upper_bound(height));
        for _ in 0..count {
            // Clamp guards the rare f32 rounding of `gen_range` up to the bound.
            let x = rng.gen_range(0.0..w).min(max_x);
            let y = rng.gen_range(0.0..h).min(max_y);
            points.push(Point::new(x, y));
        }

        Ok(Self { points, width, height })
    }

    /// Wrap caller-supplied positions, clamping each into bounds.
    pub fn from_points(points: Vec<Point>, width: u32, height: u32) -> Self {
        let mut set = Self { points, width, height };
        for i in 0..set.points.len() {
            set.points[i] = set.clamp(set.points[i]);
        }
        set
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn as_slice(&self) -> &[Point] {
        &self.points
    }

    /// Positions may be rewritten in place; the length may not change.
    pub fn as_mut_slice(&mut self) -> &mut [Point] {
        &mut self.points
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Point> {
        self.points.iter()
    }

    #[inline]
    pub fn contains(&self, p: Point) -> bool {
        p.x >= 0.0 && p.y >= 0.0 && p.x < self.width as f32 && p.y < self.height as f32
    }

    /// Clamp into `[0, width) × [0, height)`.  NaN collapses to the origin.
    #[inline]
    pub fn clamp(&self, p: Point) -> Point {
        let x = if p.x.is_nan() { 0.0 } else { p.x.clamp(0.0, upper_bound(self.width)) };
        let y = if p.y.is_nan() { 0.0 } else { p.y.clamp(0.0, upper_bound(self.height)) };
        Point::new(x, y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_upper_bound_is_below_extent() {
        for e in [1u32, 4, 100, 4096, 16_777_216] {
            let ub = upper_bound(e);
            assert!(ub < e as f32);
            assert!(e as f32 - ub <= e as f32 * 1e-6);
        }
    }

    #[test]
    fn test_random_points_in_bounds() {
        let mut rng = StdRng::seed_from_u64(1);
        let set = PointSet::random(1_000, 7, 3, &mut rng).unwrap();
        assert_eq!(set.len(), 1_000);
        assert!(set.iter().all(|&p| set.contains(p)));
    }

    #[test]
    fn test_random_is_seed_deterministic() {
        let a = PointSet::random(50, 10, 10, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = PointSet::random(50, 10, 10, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_points() {
        let set = PointSet::random(0, 4, 4, &mut StdRng::seed_from_u64(0)).unwrap();
        assert!(set.is_empty());
    }

    #[test]
    fn test_from_points_clamps() {
        let set = PointSet::from_points(
            vec![Point::new(-1.0, 2.0), Point::new(4.0, 4.0), Point::new(f32::NAN, 1.0)],
            4,
            4,
        );
        assert_eq!(set.as_slice()[0], Point::new(0.0, 2.0));
        assert!(set.contains(set.as_slice()[1]));
        assert_eq!(set.as_slice()[2].x, 0.0);
    }
}
