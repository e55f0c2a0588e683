//! Default images shown for entries without decoded artwork.
//!
//! Placeholders are drawn procedurally at the target width so no icon theme
//! is needed. Every kind gets its own buffer, even where two kinds share a
//! drawing, so a placeholder can always be traced back to its kind.

use image::{Rgba, RgbaImage};

use super::Artwork;
use crate::models::EntryKind;

const BACKGROUND: Rgba<u8> = Rgba([0x1a, 0x1a, 0x1a, 0xff]);
const FOREGROUND: Rgba<u8> = Rgba([0x00, 0xff, 0x88, 0xff]);
const BORDER: Rgba<u8> = Rgba([0x33, 0x33, 0x33, 0xff]);

/// The four per-kind placeholders for one target width.
#[derive(Debug, Clone)]
pub struct Placeholders {
    width: u32,
    album: Artwork,
    directory: Artwork,
    playlist: Artwork,
    track: Artwork,
}

impl Placeholders {
    pub fn new(width: u32) -> Self {
        let width = width.max(1);
        Self {
            width,
            album: Artwork::placeholder(EntryKind::Album, draw(EntryKind::Album, width)),
            directory: Artwork::placeholder(
                EntryKind::Directory,
                draw(EntryKind::Directory, width),
            ),
            playlist: Artwork::placeholder(EntryKind::Playlist, draw(EntryKind::Playlist, width)),
            track: Artwork::placeholder(EntryKind::Track, draw(EntryKind::Track, width)),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn for_kind(&self, kind: EntryKind) -> Artwork {
        match kind {
            EntryKind::Album => self.album.clone(),
            EntryKind::Directory => self.directory.clone(),
            EntryKind::Playlist => self.playlist.clone(),
            EntryKind::Track => self.track.clone(),
        }
    }
}

fn draw(kind: EntryKind, width: u32) -> RgbaImage {
    let mut img = RgbaImage::from_pixel(width, width, BACKGROUND);
    let w = width as f32;

    match kind {
        EntryKind::Album => {
            // Optical disc: outer ring with a hole.
            let c = w / 2.0;
            fill_circle(&mut img, c, c, w * 0.40, BORDER);
            fill_circle(&mut img, c, c, w * 0.36, FOREGROUND);
            fill_circle(&mut img, c, c, w * 0.08, BACKGROUND);
        }
        EntryKind::Directory => {
            // Folder: tab on the top-left, body below.
            fill_rect(&mut img, w * 0.16, w * 0.18, w * 0.30, w * 0.12, BORDER);
            fill_rect(&mut img, w * 0.16, w * 0.27, w * 0.68, w * 0.48, BORDER);
            fill_rect(&mut img, w * 0.18, w * 0.29, w * 0.64, w * 0.44, FOREGROUND);
        }
        EntryKind::Playlist | EntryKind::Track => {
            // Eighth note.
            fill_circle(&mut img, w * 0.40, w * 0.68, w * 0.12, FOREGROUND);
            fill_rect(&mut img, w * 0.48, w * 0.20, w * 0.05, w * 0.48, FOREGROUND);
            fill_rect(&mut img, w * 0.48, w * 0.20, w * 0.20, w * 0.06, FOREGROUND);
        }
    }

    img
}

fn fill_rect(img: &mut RgbaImage, x: f32, y: f32, w: f32, h: f32, color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    let x0 = (x.max(0.0) as u32).min(width);
    let y0 = (y.max(0.0) as u32).min(height);
    let x1 = ((x + w).ceil().max(0.0) as u32).min(width);
    let y1 = ((y + h).ceil().max(0.0) as u32).min(height);

    for py in y0..y1 {
        for px in x0..x1 {
            img.put_pixel(px, py, color);
        }
    }
}

fn fill_circle(img: &mut RgbaImage, cx: f32, cy: f32, radius: f32, color: Rgba<u8>) {
    let (width, height) = img.dimensions();
    let r2 = radius * radius;

    for py in 0..height {
        for px in 0..width {
            let dx = px as f32 + 0.5 - cx;
            let dy = py as f32 + 0.5 - cy;
            if dx * dx + dy * dy <= r2 {
                img.put_pixel(px, py, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholders_match_width() {
        let placeholders = Placeholders::new(64);
        for kind in EntryKind::ORDER {
            let image = placeholders.for_kind(kind);
            assert_eq!(image.width(), 64);
            assert_eq!(image.height(), 64);
            assert!(image.is_placeholder());
        }
    }

    #[test]
    fn test_placeholders_are_distinct_per_kind() {
        let placeholders = Placeholders::new(32);
        let playlist = placeholders.for_kind(EntryKind::Playlist);
        let track = placeholders.for_kind(EntryKind::Track);

        assert!(!playlist.same_as(&track));
        assert!(playlist.same_as(&placeholders.for_kind(EntryKind::Playlist)));
        assert_eq!(
            track.origin(),
            super::super::ArtworkOrigin::Placeholder(EntryKind::Track)
        );
    }

    #[test]
    fn test_zero_width_is_clamped() {
        let placeholders = Placeholders::new(0);
        assert_eq!(placeholders.width(), 1);
        assert_eq!(placeholders.for_kind(EntryKind::Album).width(), 1);
    }

    #[test]
    fn test_album_placeholder_has_foreground() {
        let placeholders = Placeholders::new(40);
        let album = placeholders.for_kind(EntryKind::Album);
        // Between the hole and the rim.
        assert_eq!(*album.pixels().get_pixel(20, 8), FOREGROUND);
        assert_eq!(*album.pixels().get_pixel(20, 20), BACKGROUND);
    }
}
