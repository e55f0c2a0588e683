//! Artwork decoding and scaling using the image crate.
//!
//! Images are scaled to the target width while preserving aspect ratio.
//! Animated GIFs contribute their first frame.

use std::io::Cursor;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::codecs::gif::GifDecoder;
use image::imageops::FilterType;
use image::{AnimationDecoder, DynamicImage, ImageFormat, RgbaImage};
use tracing::trace;

use super::cache::ImageDecoder;

/// Tallest accepted result, as a multiple of the target width.
pub const MAX_ASPECT_RATIO: u32 = 8;

/// Decoder backing the image cache in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageScaler;

impl ImageScaler {
    pub fn new() -> Self {
        Self
    }

    /// Decode the file at `path` and scale it to `target_width`.
    pub fn scale(path: &Path, target_width: u32) -> Result<RgbaImage> {
        let img = open_image(path)?;
        let (width, height) = compute_target_size(img.width(), img.height(), target_width)
            .ok_or_else(|| {
                anyhow!(
                    "Image too tall to scale: {:?} is {}x{}",
                    path,
                    img.width(),
                    img.height()
                )
            })?;
        trace!(?path, width, height, "Scaling artwork");

        if (width, height) == (img.width(), img.height()) {
            return Ok(img.into_rgba8());
        }
        // Triangle is the bilinear filter.
        Ok(img
            .resize_exact(width, height, FilterType::Triangle)
            .into_rgba8())
    }
}

impl ImageDecoder for ImageScaler {
    fn decode(&self, path: &Path, target_width: u32) -> Result<RgbaImage> {
        Self::scale(path, target_width)
    }
}

/// Size of an image scaled to `target_width`, preserving aspect ratio.
///
/// `None` when the result would be more than [`MAX_ASPECT_RATIO`] times
/// taller than wide.
pub fn compute_target_size(width: u32, height: u32, target_width: u32) -> Option<(u32, u32)> {
    let target_width = target_width.max(1);
    if width == 0 || height == 0 {
        return Some((target_width, target_width));
    }

    let scaled_height = (height as f64 * target_width as f64 / width as f64).round();
    if scaled_height > f64::from(target_width) * f64::from(MAX_ASPECT_RATIO) {
        return None;
    }
    Some((target_width, (scaled_height as u32).max(1)))
}

fn open_image(path: &Path) -> Result<DynamicImage> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read image: {:?}", path))?;
    let format = image::guess_format(&bytes).ok();

    if format == Some(ImageFormat::Gif) {
        let decoder = GifDecoder::new(Cursor::new(bytes))
            .with_context(|| format!("Failed to decode GIF: {:?}", path))?;
        let mut frames = decoder.into_frames();
        if let Some(frame) = frames.next() {
            let frame = frame.context("Failed to decode GIF frame")?;
            return Ok(DynamicImage::ImageRgba8(frame.into_buffer()));
        }
        return Err(anyhow!("GIF has no frames: {:?}", path));
    }

    match format {
        Some(fmt) => image::load_from_memory_with_format(&bytes, fmt)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
        None => image::load_from_memory(&bytes)
            .with_context(|| format!("Failed to decode image: {:?}", path)),
    }
}
