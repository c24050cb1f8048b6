//! Difference matting: recover alpha and un-premultiplied color from
//! two aligned renders of the same subject over contrasting flat
//! backgrounds.
//!
//! Compositing over a known light background gives
//! `C_light = alpha * F + (1 - alpha) * 1` and over a known dark
//! background `C_dark = alpha * F + (1 - alpha) * 0` (channels in
//! 0.0–1.0). Subtracting yields `C_light - C_dark = 1 - alpha`, so the
//! true alpha and foreground color `F` can be solved per pixel without
//! any manual mask.

use image::Rgba;

use crate::types::{Dimensions, MatteConfig, MatteError, RgbaImage};

/// Recover an RGBA image from a light-background and a dark-background
/// render of the same subject.
///
/// Deterministic and idempotent: the same inputs produce bit-identical
/// output. Performs no I/O and holds no state.
///
/// # Errors
///
/// Returns [`MatteError::DimensionMismatch`] if the two renders
/// disagree in width or height; no output is produced in that case.
pub fn matte(
    light: &RgbaImage,
    dark: &RgbaImage,
    config: &MatteConfig,
) -> Result<RgbaImage, MatteError> {
    let light_dims = Dimensions::of(light);
    let dark_dims = Dimensions::of(dark);
    if light_dims != dark_dims {
        return Err(MatteError::DimensionMismatch {
            light: light_dims,
            dark: dark_dims,
        });
    }

    let mut out = RgbaImage::new(light_dims.width, light_dims.height);
    for (out_pixel, (light_pixel, dark_pixel)) in out
        .pixels_mut()
        .zip(light.pixels().zip(dark.pixels()))
    {
        *out_pixel = matte_pixel(*light_pixel, *dark_pixel, config);
    }
    Ok(out)
}

/// Solve a single pixel: alpha from the per-channel difference, color
/// un-premultiplied from the dark render.
#[expect(clippy::cast_possible_truncation)]
fn matte_pixel(light: Rgba<u8>, dark: Rgba<u8>, config: &MatteConfig) -> Rgba<u8> {
    // Any light-minus-dark difference is background showing through;
    // the subject itself renders identically over both backgrounds.
    let diff_r = light[0].saturating_sub(dark[0]);
    let diff_g = light[1].saturating_sub(dark[1]);
    let diff_b = light[2].saturating_sub(dark[2]);
    let avg_diff = (u16::from(diff_r) + u16::from(diff_g) + u16::from(diff_b)) / 3;

    // avg_diff <= 255, so this stays in u8 range.
    let mut alpha = (255 - avg_diff) as u8;
    if alpha < config.transparent_cutoff {
        alpha = 0;
    }
    if alpha > config.opaque_cutoff {
        alpha = 255;
    }

    if alpha == 0 {
        return Rgba([0, 0, 0, 0]);
    }

    // Over black, C_dark = alpha * F, so F = C_dark * 255 / alpha.
    let recover = |c: u8| -> u8 { (u16::from(c) * 255 / u16::from(alpha)).min(255) as u8 };
    Rgba([recover(dark[0]), recover(dark[1]), recover(dark[2]), alpha])
}
