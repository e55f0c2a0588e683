//! Artwork pipeline for the library browser.
//!
//! This module provides:
//! - `Artwork` - Shared decoded RGBA image tagged with its origin
//! - `Placeholders` - Per-kind default images rendered at a target width
//! - `ImageScaler` - Decodes and scales artwork files
//! - `ImageCache` - Memoizes decoded artwork by `(path, width)`

pub mod cache;
pub mod placeholder;
pub mod scaler;

use std::fmt;
use std::sync::Arc;

use image::RgbaImage;

use crate::models::EntryKind;

pub use cache::{ImageCache, ImageDecoder};
pub use placeholder::Placeholders;
pub use scaler::ImageScaler;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtworkOrigin {
    Placeholder(EntryKind),
    Decoded,
}

/// A decoded image ready for display.
///
/// Cloning is cheap; pixels are shared.
#[derive(Clone)]
pub struct Artwork {
    pixels: Arc<RgbaImage>,
    origin: ArtworkOrigin,
}

impl Artwork {
    pub fn placeholder(kind: EntryKind, pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            origin: ArtworkOrigin::Placeholder(kind),
        }
    }

    pub fn decoded(pixels: RgbaImage) -> Self {
        Self {
            pixels: Arc::new(pixels),
            origin: ArtworkOrigin::Decoded,
        }
    }

    pub fn origin(&self) -> ArtworkOrigin {
        self.origin
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.origin, ArtworkOrigin::Placeholder(_))
    }

    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }

    /// True when both handles share the same pixel buffer.
    pub fn same_as(&self, other: &Artwork) -> bool {
        Arc::ptr_eq(&self.pixels, &other.pixels)
    }
}

impl fmt::Debug for Artwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Artwork")
            .field("origin", &self.origin)
            .field("width", &self.width())
            .field("height", &self.height())
            .finish()
    }
}
