//! Memoizing artwork cache.
//!
//! - Keyed by the exact `(path, width)` pair
//! - Unbounded: entries live as long as the cache object
//! - Decoding happens outside the lock; concurrent misses on the same key may
//!   decode twice, the first stored result wins
//! - Decode failures are logged and never cached

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use image::RgbaImage;
use parking_lot::RwLock;
use tracing::{debug, trace, warn};

use super::{Artwork, ImageScaler};

/// Turns an artwork file into pixels at a target width.
pub trait ImageDecoder: Send + Sync {
    fn decode(&self, path: &Path, target_width: u32) -> Result<RgbaImage>;
}

/// Cache key for artwork lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub width: u32,
}

impl CacheKey {
    pub fn new(path: &Path, width: u32) -> Self {
        Self {
            path: path.to_path_buf(),
            width,
        }
    }
}

/// Shared artwork cache.
///
/// Clones share the same storage, so the cache can be handed to every
/// populate pass.
#[derive(Clone)]
pub struct ImageCache {
    entries: Arc<RwLock<HashMap<CacheKey, Artwork>>>,
    decoder: Arc<dyn ImageDecoder>,
}

impl ImageCache {
    /// Create a cache backed by the image crate.
    pub fn new() -> Self {
        Self::with_decoder(ImageScaler::new())
    }

    pub fn with_decoder<D>(decoder: D) -> Self
    where
        D: ImageDecoder + 'static,
    {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            decoder: Arc::new(decoder),
        }
    }

    /// Get the artwork for `path` at `width`, decoding on a miss.
    pub fn get(&self, path: &Path, width: u32) -> Option<Artwork> {
        let key = CacheKey::new(path, width);

        if let Some(cached) = self.entries.read().get(&key) {
            trace!(?path, width, "Artwork cache hit");
            return Some(cached.clone());
        }

        debug!(?path, width, "Artwork cache miss, decoding");
        match self.decoder.decode(path, width) {
            Ok(pixels) => {
                let artwork = Artwork::decoded(pixels);
                let mut entries = self.entries.write();
                Some(entries.entry(key).or_insert(artwork).clone())
            }
            Err(e) => {
                warn!(?path, width, error = ?e, "Failed to read artwork");
                None
            }
        }
    }

    pub fn contains(&self, path: &Path, width: u32) -> bool {
        self.entries.read().contains_key(&CacheKey::new(path, width))
    }

    /// Number of cached images.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for ImageCache {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use image::Rgba;
    use tempfile::tempdir;

    /// Counts calls; fails the first `failures` of them.
    struct FlakyDecoder {
        calls: Arc<AtomicUsize>,
        failures: usize,
    }

    impl ImageDecoder for FlakyDecoder {
        fn decode(&self, _path: &Path, target_width: u32) -> Result<RgbaImage> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                return Err(anyhow!("corrupt"));
            }
            Ok(RgbaImage::new(target_width, target_width))
        }
    }

    fn flaky(failures: usize) -> (ImageCache, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let cache = ImageCache::with_decoder(FlakyDecoder {
            calls: Arc::clone(&calls),
            failures,
        });
        (cache, calls)
    }

    #[test]
    fn test_memoized_by_path_and_width() {
        let (cache, calls) = flaky(0);
        let path = Path::new("/img/a1.png");

        let first = cache.get(path, 64).unwrap();
        let second = cache.get(path, 64).unwrap();
        assert!(first.same_as(&second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let wider = cache.get(path, 128).unwrap();
        assert_eq!(wider.width(), 128);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_failure_is_not_cached() {
        let (cache, calls) = flaky(1);
        let path = Path::new("/img/a1.png");

        assert!(cache.get(path, 64).is_none());
        assert!(!cache.contains(path, 64));

        let retried = cache.get(path, 64).unwrap();
        assert!(!retried.is_placeholder());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_concurrent_gets_share_one_entry() {
        let (cache, _calls) = flaky(0);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get(Path::new("/img/shared.png"), 32).unwrap())
            })
            .collect();

        let results: Vec<Artwork> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert_eq!(cache.len(), 1);
        let stored = cache.get(Path::new("/img/shared.png"), 32).unwrap();
        assert!(results.iter().all(|artwork| artwork.same_as(&stored)));
    }

    #[test]
    fn test_real_decoder() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cover.png");
        RgbaImage::from_pixel(10, 10, Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let cache = ImageCache::new();
        let artwork = cache.get(&path, 20).unwrap();
        assert_eq!((artwork.width(), artwork.height()), (20, 20));
        assert!(cache.get(&dir.path().join("missing.png"), 20).is_none());
    }

    #[test]
    fn test_tall_strip_is_a_decode_failure() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("strip.png");
        RgbaImage::from_pixel(1, 5000, Rgba([1, 2, 3, 255]))
            .save(&path)
            .unwrap();

        let cache = ImageCache::new();
        assert!(cache.get(&path, 512).is_none());
        assert!(cache.is_empty());
    }
}
