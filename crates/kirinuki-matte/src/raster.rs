//! Raster decode/encode helpers.
//!
//! The matting engine operates on decoded, aligned pixel buffers; the
//! renders arriving from the generation service are encoded bytes.
//! These helpers bridge the two: encoded bytes in, `RgbaImage` out,
//! and back to transportable PNG.

use image::ImageEncoder;

use crate::types::{MatteError, RgbaImage};

/// Decode raw image bytes into an RGBA pixel buffer.
///
/// Supports PNG, JPEG, BMP, and WebP (whatever the `image` crate can
/// decode).
///
/// # Errors
///
/// Returns [`MatteError::EmptyInput`] if `bytes` is empty.
/// Returns [`MatteError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode_rgba(bytes: &[u8]) -> Result<RgbaImage, MatteError> {
    if bytes.is_empty() {
        return Err(MatteError::EmptyInput);
    }

    let img = image::load_from_memory(bytes).map_err(MatteError::ImageDecode)?;
    Ok(img.to_rgba8())
}

/// Encode an RGBA pixel buffer as PNG bytes.
///
/// PNG is the only output format: it is lossless and carries the alpha
/// channel the matting engine just reconstructed.
///
/// # Errors
///
/// Returns [`MatteError::PngEncode`] if PNG encoding fails.
pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>, MatteError> {
    let mut png_bytes = Vec::new();
    let encoder = image::codecs::png::PngEncoder::new(&mut png_bytes);
    encoder
        .write_image(
            image.as_raw(),
            image.width(),
            image.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(MatteError::PngEncode)?;
    Ok(png_bytes)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn empty_input_returns_error() {
        let result = decode_rgba(&[]);
        assert!(matches!(result, Err(MatteError::EmptyInput)));
    }

    #[test]
    fn corrupt_bytes_return_decode_error() {
        let result = decode_rgba(&[0xFF, 0xFE, 0x00, 0x01]);
        assert!(matches!(result, Err(MatteError::ImageDecode(_))));
    }

    #[test]
    fn encode_then_decode_preserves_pixels() {
        let img = RgbaImage::from_fn(4, 3, |x, y| {
            image::Rgba([(x * 60) as u8, (y * 80) as u8, 200, 255])
        });
        let png = encode_png(&img).unwrap();
        let decoded = decode_rgba(&png).unwrap();
        assert_eq!(decoded.as_raw(), img.as_raw());
    }

    #[test]
    fn decode_preserves_dimensions() {
        let img = RgbaImage::from_pixel(17, 31, image::Rgba([128, 64, 32, 255]));
        let png = encode_png(&img).unwrap();
        let decoded = decode_rgba(&png).unwrap();
        assert_eq!(decoded.width(), 17);
        assert_eq!(decoded.height(), 31);
    }
}
