//! Error types for the stippling core.
//!
//! `ConfigError` covers everything that must stop a session from starting.
//! `StippleError` is the crate-wide error and wraps `ConfigError` alongside
//! I/O, decoding and allocation failures.

use thiserror::Error;

use crate::config::MAX_DOTS;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("num_dots {0} exceeds the maximum of {max}", max = MAX_DOTS)]
    TooManyDots(usize),
    #[error("dot_size {0} is outside [0, 10]")]
    DotSize(f32),
    #[error("blur_strength {0} is outside [0, 1]")]
    BlurStrength(f32),
    #[error("decay {0} is outside [0.9, 1]")]
    Decay(f32),
    #[error("speed must be positive and finite, got {0}")]
    Speed(f32),
    #[error("max_step must be positive and finite, got {0}")]
    MaxStep(f32),
    #[error("image has zero size ({width}×{height})")]
    EmptyImage { width: u32, height: u32 },
    #[error("image data has {actual} values, expected {expected}")]
    ImageSize { expected: usize, actual: usize },
    #[error("image contains a non-finite intensity at index {0}")]
    NonFiniteIntensity(usize),
    #[error("image has no intensity to distribute {0} dots over")]
    NoIntensity(usize),
}

#[derive(Error, Debug)]
pub enum StippleError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot allocate {what} ({requested} elements)")]
    ResourceExhausted { what: &'static str, requested: usize },
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Allocate a zero-filled buffer, surfacing allocation failure instead of
/// aborting.
pub(crate) fn try_zeroed<T: Copy + Default>(
    what: &'static str,
    len: usize,
) -> Result<Vec<T>, StippleError> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| StippleError::ResourceExhausted { what, requested: len })?;
    data.resize(len, T::default());
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_error_messages() {
        assert_eq!(
            ConfigError::TooManyDots(20_000).to_string(),
            "num_dots 20000 exceeds the maximum of 10000"
        );
        assert_eq!(
            ConfigError::EmptyImage { width: 0, height: 4 }.to_string(),
            "image has zero size (0×4)"
        );
    }

    #[test]
    fn test_config_error_is_transparent() {
        let err: StippleError = ConfigError::Decay(0.5).into();
        assert_eq!(err.to_string(), "decay 0.5 is outside [0.9, 1]");
    }

    #[test]
    fn test_try_zeroed() {
        let v: Vec<f32> = try_zeroed("field", 16).unwrap();
        assert_eq!(v.len(), 16);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_try_zeroed_reports_exhaustion() {
        let err = try_zeroed::<f32>("field", usize::MAX).unwrap_err();
        match err {
            StippleError::ResourceExhausted { what, requested } => {
                assert_eq!(what, "field");
                assert_eq!(requested, usize::MAX);
            }
            other => panic!("expected ResourceExhausted, got {other:?}"),
        }
    }
}
