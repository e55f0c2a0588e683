//! Downloads remote artwork into a local cache directory.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use reqwest::{Client, Url};
use tracing::{debug, info, warn};
use xxhash_rust::xxh3::xxh3_64;

use super::MopidyClient;

/// Suffix source for in-progress download files.
static PARTIAL_SEQ: AtomicU64 = AtomicU64::new(0);

/// Fetches artwork over HTTP into `dir`, one file per image URI.
#[derive(Debug, Clone)]
pub struct ImageDownloader {
    http: Client,
    base_url: Url,
    dir: PathBuf,
}

impl ImageDownloader {
    pub fn new(client: &MopidyClient, dir: impl Into<PathBuf>) -> Self {
        Self {
            http: client.http().clone(),
            base_url: client.base_url().clone(),
            dir: dir.into(),
        }
    }

    /// `XDG_CACHE_HOME/mopbrowse/images`.
    pub fn default_dir() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "mopbrowse")
            .context("Could not determine cache directory")?;
        Ok(dirs.cache_dir().join("images"))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Where the artwork for `image_uri` is stored. Stable across runs.
    pub fn local_path_for(&self, image_uri: &str) -> PathBuf {
        let hash = xxh3_64(image_uri.as_bytes());
        match extension_of(image_uri) {
            Some(ext) => self.dir.join(format!("{:016x}.{}", hash, ext)),
            None => self.dir.join(format!("{:016x}", hash)),
        }
    }

    /// Download every image not already on disk. Returns how many files were
    /// written.
    pub async fn fetch_all(&self, image_uris: &[String]) -> usize {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = ?self.dir, error = %e, "Failed to create image directory");
            return 0;
        }

        let mut downloaded = 0;
        for uri in image_uris {
            let path = self.local_path_for(uri);
            if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                continue;
            }

            match self.download(uri, &path).await {
                Ok(()) => downloaded += 1,
                Err(e) => warn!(uri = %uri, error = ?e, "Failed to download image"),
            }
        }

        if downloaded > 0 {
            info!(downloaded, "Images downloaded");
        }
        downloaded
    }

    async fn download(&self, uri: &str, path: &Path) -> Result<()> {
        let url = self
            .base_url
            .join(uri)
            .with_context(|| format!("Invalid image URI: {}", uri))?;
        debug!(url = %url, ?path, "Downloading image");

        let bytes = self
            .http
            .get(url)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .context("Image request failed")?
            .bytes()
            .await
            .context("Failed to read image body")?;

        // Readers never see a half-written file.
        let partial = partial_path_for(path);
        tokio::fs::write(&partial, &bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", partial))?;
        tokio::fs::rename(&partial, path)
            .await
            .with_context(|| format!("Failed to move {:?} into place", path))?;
        Ok(())
    }
}

/// Unique sibling of `path` to write into before the rename.
fn partial_path_for(path: &Path) -> PathBuf {
    let seq = PARTIAL_SEQ.fetch_add(1, Ordering::Relaxed);
    let name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}-{}.part", name, std::process::id(), seq))
}

/// Lower-cased extension of the URI's path, if it looks like one.
fn extension_of(image_uri: &str) -> Option<String> {
    let path = image_uri.split(['?', '#']).next().unwrap_or_default();
    let name = path.rsplit('/').next().unwrap_or_default();
    let (_, ext) = name.rsplit_once('.')?;
    let valid = !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric());
    valid.then(|| ext.to_ascii_lowercase())
}
