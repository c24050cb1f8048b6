//! kirinuki-matte: Pure difference matting (sans-IO).
//!
//! Reconstructs an alpha channel and un-premultiplied foreground color
//! from two renders of the same subject over contrasting flat
//! backgrounds. This crate has **no I/O dependencies** -- it operates
//! on in-memory byte slices and decoded pixel buffers. Orchestration
//! and service calls live in `kirinuki-session`.

pub mod matte;
pub mod raster;
pub mod types;

pub use matte::matte;
pub use raster::{decode_rgba, encode_png};
pub use types::{Dimensions, MatteConfig, MatteError, RgbaImage};

/// Matte two encoded renders and return the result as PNG bytes.
///
/// Decodes both inputs, runs [`matte`], and encodes the recovered RGBA
/// buffer as PNG. This is the form the finishing pipeline consumes:
/// encoded bytes in, encoded bytes out.
///
/// # Errors
///
/// Returns [`MatteError::EmptyInput`] or [`MatteError::ImageDecode`]
/// if either input cannot be decoded,
/// [`MatteError::DimensionMismatch`] if the renders disagree in size,
/// and [`MatteError::PngEncode`] if the output cannot be encoded.
pub fn matte_encoded(
    light_bytes: &[u8],
    dark_bytes: &[u8],
    config: &MatteConfig,
) -> Result<Vec<u8>, MatteError> {
    let light = raster::decode_rgba(light_bytes)?;
    let dark = raster::decode_rgba(dark_bytes)?;
    let matted = matte::matte(&light, &dark, config)?;
    raster::encode_png(&matted)
}
