//! Low dynamic range fallback input.
//!
//! Decodes PNG/JPEG through `image` and normalizes to `[0, 1]`. The result
//! carries no HDR information and is meant as a stand-in when no `.hdr`
//! source is available.

use crate::raster::LinearRaster;
use anyhow::{Context, Result};
use image::DynamicImage;

pub fn decode_ldr(bytes: &[u8]) -> Result<LinearRaster> {
    let image = image::load_from_memory(bytes).context("decoding fallback environment image")?;
    raster_from_image(&image)
}

pub fn raster_from_image(image: &DynamicImage) -> Result<LinearRaster> {
    let rgb = image.to_rgb32f();
    let (width, height) = rgb.dimensions();
    let raster = LinearRaster::new(width, height, rgb.into_raw())
        .with_context(|| format!("fallback image has unusable dimensions {width}x{height}"))?;
    Ok(raster)
}
