//! SQLite-backed application settings.
//!
//! A single key/value table stored at `XDG_CONFIG_HOME/mopbrowse/settings.sqlite`.
//! Known keys:
//! - `albums-image-size`: artwork width in pixels
//! - `mopidy-base-url`: base URL of the Mopidy HTTP frontend

use std::env;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{debug, info, warn};

/// Settings key for the artwork width.
pub const IMAGE_SIZE_KEY: &str = "albums-image-size";
/// Settings key for the server URL.
pub const MOPIDY_URL_KEY: &str = "mopidy-base-url";

/// Overrides the stored server URL for one run.
pub const MOPIDY_URL_ENV: &str = "MOPIDY_URL";

pub const DEFAULT_IMAGE_SIZE: u32 = 100;
pub const MIN_IMAGE_SIZE: u32 = 32;
pub const MAX_IMAGE_SIZE: u32 = 512;
pub const DEFAULT_MOPIDY_URL: &str = "http://127.0.0.1:6680/";

/// Persistent key/value settings backed by one SQLite connection.
pub struct SettingsStore {
    conn: Connection,
}

impl SettingsStore {
    pub fn open_default() -> Result<Self> {
        let db_path = Self::default_db_path()?;
        Self::open_or_recover(&db_path)
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "mopbrowse")
            .context("Failed to determine project directories")?;
        Ok(proj_dirs.config_dir().join("settings.sqlite"))
    }

    /// Opens or creates the settings database at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create settings directory: {:?}", parent))?;
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open settings at {:?}", path))?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            ",
        )
        .context("Failed to configure SQLite pragmas")?;

        let store = Self { conn };
        store.create_tables()?;

        info!("Opened settings store at {:?}", path);
        Ok(store)
    }

    /// Open `path`, moving an unreadable database aside and starting fresh.
    pub fn open_or_recover(path: &Path) -> Result<Self> {
        match Self::open(path) {
            Ok(store) => Ok(store),
            Err(e) => {
                warn!(error = ?e, "Settings store unreadable, recreating it");
                let backup_path = path.with_extension("sqlite.corrupted");
                if path.exists() {
                    std::fs::rename(path, &backup_path).with_context(|| {
                        format!("Failed to back up settings to {:?}", backup_path)
                    })?;
                }
                Self::open(path)
            }
        }
    }

    fn create_tables(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL
            );
            ",
            )
            .context("Failed to create settings table")?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<String>> {
        self.conn
            .query_row(
                "SELECT value FROM settings WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .with_context(|| format!("Failed to read setting {}", key))
    }

    /// Store `value`. Returns true when it differs from the previous value.
    pub fn set(&self, key: &str, value: &str) -> Result<bool> {
        if self.get(key)?.as_deref() == Some(value) {
            return Ok(false);
        }

        self.conn
            .execute(
                "INSERT INTO settings (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )
            .with_context(|| format!("Failed to write setting {}", key))?;
        debug!(key, value, "Setting changed");
        Ok(true)
    }

    /// Artwork width, clamped to the supported range.
    pub fn image_size(&self) -> Result<u32> {
        let stored = self.get(IMAGE_SIZE_KEY)?;
        let size = match stored.as_deref().map(str::parse::<u32>) {
            Some(Ok(size)) => size,
            Some(Err(e)) => {
                warn!(error = %e, "Ignoring invalid image size setting");
                DEFAULT_IMAGE_SIZE
            }
            None => DEFAULT_IMAGE_SIZE,
        };
        Ok(clamp_image_size(size))
    }

    /// Returns true when the effective size changed.
    pub fn set_image_size(&self, size: u32) -> Result<bool> {
        self.set(IMAGE_SIZE_KEY, &clamp_image_size(size).to_string())
    }

    /// Server URL; `MOPIDY_URL` wins over the stored value.
    pub fn mopidy_url(&self) -> Result<String> {
        Ok(resolve_mopidy_url(
            env::var(MOPIDY_URL_ENV).ok(),
            self.get(MOPIDY_URL_KEY)?,
        ))
    }

    pub fn set_mopidy_url(&self, url: &str) -> Result<bool> {
        self.set(MOPIDY_URL_KEY, url.trim())
    }
}

pub fn clamp_image_size(size: u32) -> u32 {
    size.clamp(MIN_IMAGE_SIZE, MAX_IMAGE_SIZE)
}

fn resolve_mopidy_url(from_env: Option<String>, stored: Option<String>) -> String {
    from_env
        .into_iter()
        .chain(stored)
        .map(|url| url.trim().to_string())
        .find(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_MOPIDY_URL.to_string())
}
