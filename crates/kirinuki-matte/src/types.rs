//! Shared types for the kirinuki matting engine.

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can reference decoded
/// pixel buffers without depending on `image` directly.
pub use image::RgbaImage;

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// The dimensions of a decoded pixel buffer.
    #[must_use]
    pub fn of(image: &RgbaImage) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Configuration for alpha recovery.
///
/// The cutoffs suppress residual background noise: recovered alpha
/// below `transparent_cutoff` is forced fully transparent, alpha above
/// `opaque_cutoff` fully opaque. The defaults are the empirically
/// tuned values; both are overridable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatteConfig {
    /// Alpha values below this are snapped to 0 (fully transparent).
    pub transparent_cutoff: u8,

    /// Alpha values above this are snapped to 255 (fully opaque).
    pub opaque_cutoff: u8,
}

impl Default for MatteConfig {
    fn default() -> Self {
        Self {
            transparent_cutoff: 10,
            opaque_cutoff: 245,
        }
    }
}

/// Errors that can occur during matting or raster conversion.
#[derive(Debug, thiserror::Error)]
pub enum MatteError {
    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(image::ImageError),

    /// PNG encoding failed.
    #[error("PNG encoding failed: {0}")]
    PngEncode(image::ImageError),

    /// The two renders disagree in size.
    #[error("render dimensions do not match: light is {light}, dark is {dark}")]
    DimensionMismatch {
        /// Dimensions of the light-background render.
        light: Dimensions,
        /// Dimensions of the dark-background render.
        dark: Dimensions,
    },
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dimensions_display() {
        let d = Dimensions {
            width: 640,
            height: 480,
        };
        assert_eq!(d.to_string(), "640x480");
    }

    #[test]
    fn dimensions_of_image() {
        let img = RgbaImage::new(17, 31);
        assert_eq!(
            Dimensions::of(&img),
            Dimensions {
                width: 17,
                height: 31,
            },
        );
    }

    #[test]
    fn matte_config_defaults() {
        let config = MatteConfig::default();
        assert_eq!(config.transparent_cutoff, 10);
        assert_eq!(config.opaque_cutoff, 245);
    }

    #[test]
    fn matte_config_serde_round_trip() {
        let config = MatteConfig {
            transparent_cutoff: 5,
            opaque_cutoff: 250,
        };
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: MatteConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(config, deserialized);
    }

    #[test]
    fn error_dimension_mismatch_display() {
        let err = MatteError::DimensionMismatch {
            light: Dimensions {
                width: 100,
                height: 100,
            },
            dark: Dimensions {
                width: 50,
                height: 50,
            },
        };
        assert_eq!(
            err.to_string(),
            "render dimensions do not match: light is 100x100, dark is 50x50",
        );
    }

    #[test]
    fn error_empty_input_display() {
        let err = MatteError::EmptyInput;
        assert_eq!(err.to_string(), "input image data is empty");
    }
}
