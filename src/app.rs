//! Coordinating-thread driver.
//!
//! Network work runs on a tokio runtime and reports back as [`AppEvent`]s.
//! The owning thread calls [`BrowseApp::tick`] in a loop: it applies the
//! events, then drains image handoffs into the live collection.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use flume::{Receiver, RecvTimeoutError, Sender};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::images::ImageCache;
use crate::library::{Activation, LibraryBrowser, PassHandle, RefreshOutcome, ROOT_URI};
use crate::models::Entry;
use crate::remote::{ImageDownloader, LocationFetch, MopidyClient, MopidyLibrary};
use crate::settings::SettingsStore;

/// Interval between two handoff drains.
pub const TICK: Duration = Duration::from_millis(16);

/// Startup configuration for [`BrowseApp`].
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Base URL of the Mopidy HTTP frontend.
    pub base_url: String,
    /// Where downloaded artwork is kept.
    pub image_dir: PathBuf,
    pub image_width: u32,
    /// Location shown first.
    pub start_uri: String,
}

impl AppConfig {
    pub fn from_settings(settings: &SettingsStore) -> Result<Self> {
        Ok(Self {
            base_url: settings.mopidy_url()?,
            image_dir: ImageDownloader::default_dir()?,
            image_width: settings.image_size()?,
            start_uri: ROOT_URI.to_string(),
        })
    }
}

/// Results of background I/O, consumed on the coordinating thread.
#[derive(Debug)]
pub enum AppEvent {
    /// A location fetch finished, successfully or not.
    DataRefreshed { uri: String, fetch: LocationFetch },
    /// An artwork download batch finished; `downloaded` files are new.
    ImagesDownloaded { downloaded: usize },
}

/// The library browser wired to a Mopidy server.
pub struct BrowseApp {
    runtime: Runtime,
    client: MopidyClient,
    library: MopidyLibrary,
    browser: LibraryBrowser,
    events_tx: Sender<AppEvent>,
    events_rx: Receiver<AppEvent>,
    in_flight: usize,
    passes: Vec<PassHandle>,
}

impl BrowseApp {
    pub fn new(config: AppConfig) -> Result<Self> {
        Self::with_cache(config, ImageCache::new())
    }

    pub fn with_cache(config: AppConfig, cache: ImageCache) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("mopbrowse-io")
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        let client = MopidyClient::new(&config.base_url)?;
        let downloader = ImageDownloader::new(&client, &config.image_dir);
        let library = MopidyLibrary::new(client.clone(), downloader);
        let browser = LibraryBrowser::new(&config.start_uri, config.image_width, cache);
        let (events_tx, events_rx) = flume::unbounded();

        info!(url = %config.base_url, width = config.image_width, "Library browser ready");
        Ok(Self {
            runtime,
            client,
            library,
            browser,
            events_tx,
            events_rx,
            in_flight: 0,
            passes: Vec::new(),
        })
    }

    pub fn browser(&self) -> &LibraryBrowser {
        &self.browser
    }

    /// Fetch the current location.
    pub fn start(&mut self) {
        let uri = self.browser.current_uri().to_string();
        self.spawn_fetch(uri);
    }

    pub fn show_location(&mut self, uri: &str, history: bool) {
        if self.browser.navigate(uri, history) {
            self.spawn_fetch(uri.to_string());
        }
    }

    pub fn go_back(&mut self) {
        if let Some(parent) = self.browser.navigate_back() {
            self.spawn_fetch(parent);
        }
    }

    pub fn set_filter_text(&mut self, text: &str) {
        self.browser.set_filter_text(text);
    }

    pub fn set_image_size(&mut self, width: u32) {
        if let Some(pass) = self.browser.set_image_width(width) {
            self.passes.push(pass);
        }
    }

    pub fn visible_entries(&self) -> Vec<Entry> {
        self.browser.visible_entries()
    }

    /// Activate the visible entry at `position`.
    pub fn activate(&mut self, position: usize) -> Activation {
        let activation = self.browser.activate(position);
        match &activation {
            Activation::Navigate { uri } => self.show_location(uri, true),
            Activation::Play { uris } => {
                let client = self.client.clone();
                let uris = uris.clone();
                self.runtime.spawn(async move {
                    if !client.play_tracks(&uris).await {
                        warn!(?uris, "Failed to start playback");
                    }
                });
            }
            Activation::ShowAlbum { uri } => debug!(uri = %uri, "Album details requested"),
            Activation::Nothing => {}
        }
        activation
    }

    fn spawn_fetch(&mut self, uri: String) {
        self.in_flight += 1;
        let library = self.library.clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let fetch = library.fetch(&uri).await;
            let _ = tx.send(AppEvent::DataRefreshed { uri, fetch });
        });
    }

    fn spawn_download(&mut self, image_uris: Vec<String>) {
        self.in_flight += 1;
        let downloader = self.library.images().clone();
        let tx = self.events_tx.clone();
        self.runtime.spawn(async move {
            let downloaded = downloader.fetch_all(&image_uris).await;
            let _ = tx.send(AppEvent::ImagesDownloaded { downloaded });
        });
    }

    pub fn handle_event(&mut self, event: AppEvent) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match event {
            AppEvent::DataRefreshed { uri, fetch } => {
                let outcome = match fetch {
                    LocationFetch::Found(listing) => self.browser.data_refreshed(&uri, Some(&listing)),
                    LocationFetch::NotFound => self.browser.data_refreshed(&uri, None),
                    LocationFetch::Unavailable => {
                        warn!(uri = %uri, "Server unavailable, keeping current library view");
                        return;
                    }
                };

                match outcome {
                    RefreshOutcome::Redirect { to } => self.spawn_fetch(to),
                    RefreshOutcome::Built { image_requests } => {
                        let image_uris: Vec<String> = image_requests
                            .into_iter()
                            .filter_map(|request| request.image_uri)
                            .collect();
                        if !image_uris.is_empty() {
                            debug!(count = image_uris.len(), "Will fetch images since store was just updated");
                            self.spawn_download(image_uris);
                        }
                    }
                    RefreshOutcome::Ignored | RefreshOutcome::Missing | RefreshOutcome::Discarded => {}
                }
            }
            AppEvent::ImagesDownloaded { downloaded } => {
                debug!(downloaded, "Images available");
                self.passes.push(self.browser.images_available());
            }
        }
    }

    /// One iteration of the coordinating loop. Returns the number of handoffs
    /// applied.
    pub fn tick(&mut self) -> usize {
        match self.events_rx.recv_timeout(TICK) {
            Ok(event) => self.handle_event(event),
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => warn!("Event queue disconnected"),
        }
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
        }

        let applied = self.browser.drain_handoffs();
        self.reap_passes();
        applied
    }

    fn reap_passes(&mut self) {
        let (done, running): (Vec<_>, Vec<_>) = self
            .passes
            .drain(..)
            .partition(PassHandle::is_finished);
        self.passes = running;
        for pass in done {
            let report = pass.join();
            debug!(?report, "Image pass joined");
        }
    }

    /// Nothing in flight, no pass alive, no handoff waiting.
    pub fn is_idle(&self) -> bool {
        self.in_flight == 0 && self.passes.is_empty() && self.browser.is_idle()
    }

    /// Tick until idle. Returns false when `timeout` ran out first.
    pub fn run_until_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            self.tick();
            if self.is_idle() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;

    use image::{DynamicImage, ImageFormat, RgbaImage};
    use serde_json::{json, Value};
    use tempfile::tempdir;

    use crate::remote::stub::MopidyStub;

    fn png_bytes() -> Vec<u8> {
        let mut bytes = Vec::new();
        DynamicImage::ImageRgba8(RgbaImage::new(20, 10))
            .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
            .unwrap();
        bytes
    }

    fn library_stub() -> MopidyStub {
        let images = HashMap::from([("a1.png".to_string(), png_bytes())]);
        MopidyStub::with_images(
            |method: &str, params: &Value| match method {
                "core.library.browse" if params["uri"].is_null() => Some(json!([
                    { "type": "album", "uri": "local:album:a1", "name": "X" },
                    { "type": "directory", "uri": "local:directory", "name": "Files" },
                    { "type": "track", "uri": "local:track:t1", "name": "Loose track" }
                ])),
                "core.library.lookup" => Some(json!({
                    "local:album:a1": [{ "album": { "artists": [{ "name": "Y" }] } }]
                })),
                "core.library.get_images" => Some(json!({
                    "local:album:a1": [{ "uri": "/images/a1.png" }]
                })),
                _ => None,
            },
            images,
        )
    }

    fn config(base_url: &str, dir: &std::path::Path, start_uri: &str) -> AppConfig {
        AppConfig {
            base_url: base_url.to_string(),
            image_dir: dir.join("images"),
            image_width: 40,
            start_uri: start_uri.to_string(),
        }
    }

    #[test]
    fn test_browse_root_end_to_end() {
        let stub = library_stub();
        let dir = tempdir().unwrap();
        let mut app = BrowseApp::new(config(stub.base_url(), dir.path(), ROOT_URI)).unwrap();

        app.start();
        assert!(app.run_until_idle(Duration::from_secs(10)));

        let entries = app.visible_entries();
        let uris: Vec<&str> = entries.iter().map(|e| e.uri.as_str()).collect();
        assert_eq!(uris, vec!["local:album:a1", "local:directory", "local:track:t1"]);

        let album = &entries[0];
        assert_eq!(album.secondary_text, "Y");
        assert!(!album.has_placeholder());
        assert_eq!((album.image.width(), album.image.height()), (40, 20));
        assert!(entries[1].has_placeholder());

        app.set_filter_text("loose");
        assert_eq!(app.visible_entries().len(), 1);
    }

    #[test]
    fn test_missing_location_redirects_to_root() {
        let stub = library_stub();
        let dir = tempdir().unwrap();
        let mut app = BrowseApp::new(config(stub.base_url(), dir.path(), "local:gone")).unwrap();

        app.start();
        assert!(app.run_until_idle(Duration::from_secs(10)));

        assert_eq!(app.browser().current_uri(), ROOT_URI);
        assert_eq!(app.visible_entries().len(), 3);
    }

    #[test]
    fn test_width_change_redecodes() {
        let stub = library_stub();
        let dir = tempdir().unwrap();
        let mut app = BrowseApp::new(config(stub.base_url(), dir.path(), ROOT_URI)).unwrap();
        app.start();
        assert!(app.run_until_idle(Duration::from_secs(10)));

        app.set_image_size(80);
        assert!(app.run_until_idle(Duration::from_secs(10)));
        for entry in app.visible_entries() {
            assert_eq!(entry.image.width(), 80, "{}", entry.uri);
        }
    }

    #[test]
    fn test_unreachable_server_leaves_library_empty() {
        let dir = tempdir().unwrap();
        let mut app = BrowseApp::new(config("http://127.0.0.1:1/", dir.path(), ROOT_URI)).unwrap();

        app.start();
        assert!(app.run_until_idle(Duration::from_secs(10)));
        assert!(app.visible_entries().is_empty());
        assert_eq!(app.browser().current_uri(), ROOT_URI);
    }
}
