//! Read-only target intensity grid.
//!
//! Loaded once per process; every session reads from it but never writes.

use std::path::Path;

use image::DynamicImage;
use log::{debug, warn};

use crate::error::{ConfigError, StippleError};
use crate::field::Field;

/// Grayscale intensities in `[0, 1]`, sampled bilinearly.
#[derive(Clone, Debug, PartialEq)]
pub struct ImageSampler {
    field: Field,
}

impl ImageSampler {
    /// Build from row-major intensities.
    ///
    /// Rejects zero dimensions, a length mismatch, and non-finite values.
    /// Finite values outside `[0, 1]` are clamped.
    pub fn from_luma(width: u32, height: u32, mut data: Vec<f32>) -> Result<Self, ConfigError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyImage { width, height });
        }
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(ConfigError::ImageSize { expected, actual: data.len() });
        }
        if let Some(idx) = data.iter().position(|v| !v.is_finite()) {
            return Err(ConfigError::NonFiniteIntensity(idx));
        }

        let mut clamped = 0usize;
        for v in &mut data {
            if !(0.0..=1.0).contains(v) {
                *v = v.clamp(0.0, 1.0);
                clamped += 1;
            }
        }
        if clamped > 0 {
            warn!("Clamped {clamped} intensities into [0, 1]");
        }

        Ok(Self { field: Field::from_vec(width, height, data) })
    }

    /// Convert a decoded image to luma and normalize by 255.
    pub fn from_image(image: &DynamicImage) -> Result<Self, ConfigError> {
        let luma = image.to_luma8();
        let (width, height) = luma.dimensions();
        let data = luma.pixels().map(|p| p.0[0] as f32 / 255.0).collect();
        Self::from_luma(width, height, data)
    }

    /// Decode an image file from disk.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StippleError> {
        let path = path.as_ref();
        let image = image::open(path)?;
        let sampler = Self::from_image(&image)?;
        debug!(
            "Loaded {} ({}×{}, mean intensity {:.3})",
            path.display(),
            sampler.width(),
            sampler.height(),
            sampler.mean()
        );
        Ok(sampler)
    }

    #[inline]
    pub fn width(&self) -> u32 {
        self.field.width()
    }

    #[inline]
    pub fn height(&self) -> u32 {
        self.field.height()
    }

    /// Exact intensity of pixel `(i, j)`.
    #[inline]
    pub fn intensity(&self, i: u32, j: u32) -> f32 {
        self.field.get(i, j)
    }

    /// Bilinear intensity at a continuous position, clamp-to-edge.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        self.field.sample(x, y)
    }

    pub fn as_field(&self) -> &Field {
        &self.field
    }

    pub fn as_slice(&self) -> &[f32] {
        self.field.as_slice()
    }

    pub fn total(&self) -> f64 {
        self.field.sum()
    }

    pub fn mean(&self) -> f64 {
        self.field.mean()
    }

    /// `1 − intensity` everywhere: dark pixels become dense.
    pub fn inverted(&self) -> Self {
        let data = self.field.as_slice().iter().map(|v| 1.0 - v).collect();
        Self { field: Field::from_vec(self.width(), self.height(), data) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_rejects_zero_size() {
        assert_eq!(
            ImageSampler::from_luma(0, 3, vec![]),
            Err(ConfigError::EmptyImage { width: 0, height: 3 })
        );
    }

    #[test]
    fn test_rejects_length_mismatch() {
        assert_eq!(
            ImageSampler::from_luma(2, 2, vec![0.0; 3]),
            Err(ConfigError::ImageSize { expected: 4, actual: 3 })
        );
    }

    #[test]
    fn test_rejects_nan() {
        assert_eq!(
            ImageSampler::from_luma(2, 1, vec![0.5, f32::NAN]),
            Err(ConfigError::NonFiniteIntensity(1))
        );
    }

    #[test]
    fn test_clamps_out_of_range() {
        let img = ImageSampler::from_luma(2, 1, vec![-0.5, 3.0]).unwrap();
        assert_eq!(img.intensity(0, 0), 0.0);
        assert_eq!(img.intensity(1, 0), 1.0);
    }

    #[test]
    fn test_from_image_normalizes() {
        let mut gray = GrayImage::new(2, 2);
        gray.put_pixel(0, 0, Luma([255]));
        gray.put_pixel(1, 1, Luma([51]));
        let img = ImageSampler::from_image(&DynamicImage::ImageLuma8(gray)).unwrap();
        assert_eq!((img.width(), img.height()), (2, 2));
        assert!((img.intensity(0, 0) - 1.0).abs() < 1e-6);
        assert!((img.intensity(1, 1) - 0.2).abs() < 1e-6);
        assert_eq!(img.intensity(1, 0), 0.0);
    }

    #[test]
    fn test_open_round_trips_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ramp.png");
        let gray = GrayImage::from_fn(8, 4, |x, _| Luma([(x * 32) as u8]));
        gray.save(&path).unwrap();

        let img = ImageSampler::open(&path).unwrap();
        assert_eq!((img.width(), img.height()), (8, 4));
        assert!((img.intensity(7, 0) - 224.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_open_missing_file_fails() {
        assert!(ImageSampler::open("/no/such/image.png").is_err());
    }

    #[test]
    fn test_sample_and_inversion() {
        let img = ImageSampler::from_luma(2, 1, vec![0.0, 1.0]).unwrap();
        assert!((img.sample(1.0, 0.5) - 0.5).abs() < 1e-6);
        let inv = img.inverted();
        assert_eq!(inv.intensity(0, 0), 1.0);
        assert_eq!(inv.intensity(1, 0), 0.0);
        assert!((img.total() - 1.0).abs() < 1e-9);
    }
}
