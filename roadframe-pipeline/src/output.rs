//! Writing selected frames in the configured output format

use crate::{Error, Result};
use image::{ImageFormat, RgbImage};
use ravif::{Encoder, Img, RGB8};
use roadframe_core::OutputFormat;
use std::path::Path;

/// AVIF quality of selected frames (0-100)
const AVIF_QUALITY: f32 = 80.0;

/// Writes the candidate frame at `source` to `dest` in `format`.
///
/// JPEG output copies the candidate bytes unchanged; every other format
/// decodes the candidate and re-encodes it. WebP is written lossless.
pub fn write_selected(source: &Path, dest: &Path, format: OutputFormat) -> Result<()> {
    let load = || image::open(source).map(|img| img.to_rgb8());
    match format {
        OutputFormat::Jpeg => {
            std::fs::copy(source, dest)?;
        }
        OutputFormat::Webp => load()?.save_with_format(dest, ImageFormat::WebP)?,
        OutputFormat::Png => load()?.save_with_format(dest, ImageFormat::Png)?,
        OutputFormat::Avif => std::fs::write(dest, encode_avif(&load()?, AVIF_QUALITY)?)?,
    }
    Ok(())
}

/// Encodes an RGB image to AVIF format
pub fn encode_avif(image: &RgbImage, quality: f32) -> Result<Vec<u8>> {
    let width = image.width() as usize;
    let height = image.height() as usize;

    let pixels: Vec<RGB8> = image
        .pixels()
        .map(|p| RGB8::new(p[0], p[1], p[2]))
        .collect();

    let encoder = Encoder::new()
        .with_quality(quality)
        .with_speed(4)
        .with_num_threads(Some(num_cpus::get()));

    let encoded = encoder
        .encode_rgb(Img::new(pixels.as_slice(), width, height))
        .map_err(|e| Error::AvifEncode(format!("{:?}", e)))?;

    Ok(encoded.avif_file)
}
