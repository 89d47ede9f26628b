//! How closely a point distribution follows the image.
//!
//! The image is split into `bins_x × bins_y` rectangular bins.  Expected
//! counts are proportional to the total intensity inside each bin; observed
//! counts come from the points.  Pearson's chi-squared compares the two.

use crate::points::Point;
use crate::sampler::ImageSampler;

#[inline]
fn bin_of(coord: f32, extent: u32, bins: usize) -> usize {
    let b = (coord / extent as f32 * bins as f32) as usize;
    b.min(bins - 1)
}

/// Point counts per bin, row-major.  Empty when either bin count is zero.
pub fn binned_counts(points: &[Point], width: u32, height: u32, bins_x: usize, bins_y: usize) -> Vec<u32> {
    if bins_x == 0 || bins_y == 0 {
        return Vec::new();
    }
    let mut counts = vec![0u32; bins_x * bins_y];
    for p in points {
        let bx = bin_of(p.x, width, bins_x);
        let by = bin_of(p.y, height, bins_y);
        counts[by * bins_x + bx] += 1;
    }
    counts
}

/// Summed intensity per bin, row-major.  Pixels are binned by their center.
pub fn binned_intensity(image: &ImageSampler, bins_x: usize, bins_y: usize) -> Vec<f64> {
    if bins_x == 0 || bins_y == 0 {
        return Vec::new();
    }
    let mut sums = vec![0.0f64; bins_x * bins_y];
    for j in 0..image.height() {
        let by = bin_of(j as f32 + 0.5, image.height(), bins_y);
        for i in 0..image.width() {
            let bx = bin_of(i as f32 + 0.5, image.width(), bins_x);
            sums[by * bins_x + bx] += image.intensity(i, j) as f64;
        }
    }
    sums
}

/// Pearson's chi-squared of the observed bin counts against the counts the
/// image intensity predicts.  Bins with no expected mass are skipped.
pub fn chi_squared(points: &[Point], image: &ImageSampler, bins_x: usize, bins_y: usize) -> f64 {
    let observed = binned_counts(points, image.width(), image.height(), bins_x, bins_y);
    let intensity = binned_intensity(image, bins_x, bins_y);
    let total: f64 = intensity.iter().sum();
    if total <= 0.0 || points.is_empty() {
        return 0.0;
    }

    let n = points.len() as f64;
    observed
        .iter()
        .zip(&intensity)
        .filter(|(_, &mass)| mass > 0.0)
        .map(|(&o, &mass)| {
            let expected = n * mass / total;
            let diff = o as f64 - expected;
            diff * diff / expected
        })
        .sum()
}

/// Fraction of points inside `[x0, x1) × [y0, y1)`.
pub fn fraction_within(points: &[Point], x0: f32, y0: f32, x1: f32, y1: f32) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let inside = points
        .iter()
        .filter(|p| p.x >= x0 && p.x < x1 && p.y >= y0 && p.y < y1)
        .count();
    inside as f64 / points.len() as f64
}
