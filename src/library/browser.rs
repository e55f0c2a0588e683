//! Coordinating-thread facade over the library engine.
//!
//! Owns the write path of the live collection. Location events rebuild it
//! inline through the coordinator, image events start populate passes, and
//! [`LibraryBrowser::drain_handoffs`] applies their results once per tick.

use std::sync::Arc;

use flume::Receiver;
use tracing::{debug, info, warn};

use super::coordinator::Coordinator;
use super::filter::FilterView;
use super::navigation::{Activation, Navigation, ROOT_URI};
use super::populator::{ImagePopulator, PassHandle, HANDOFF_CAPACITY};
use super::store_builder::{ImageRequest, StoreBuilder};
use crate::images::{ImageCache, Placeholders};
use crate::models::{Collection, Entry, ImageHandoff, LocationListing};

/// What a "data refreshed" event led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The event was for a location that is not current.
    Ignored,
    /// The location does not exist; navigation moved to `to`, which needs
    /// fetching.
    Redirect { to: String },
    /// Even the root location is missing.
    Missing,
    /// The collection was rebuilt; these entries want their artwork.
    Built { image_requests: Vec<ImageRequest> },
    /// The location changed while waiting for build access.
    Discarded,
}

/// Library state owned by the coordinating thread.
///
/// Holds the navigation stack, the live collection and its filtered view, and
/// the populator that fills in artwork.
pub struct LibraryBrowser {
    navigation: Navigation,
    collection: Collection,
    coordinator: Arc<Coordinator>,
    populator: ImagePopulator,
    handoff_rx: Receiver<ImageHandoff>,
    placeholders: Placeholders,
    filter: FilterView,
    visible: Vec<usize>,
}

impl LibraryBrowser {
    pub fn new(start_uri: &str, image_width: u32, cache: ImageCache) -> Self {
        let collection = Collection::new();
        let coordinator = Arc::new(Coordinator::new());
        let (handoff_tx, handoff_rx) = flume::bounded(HANDOFF_CAPACITY);
        let populator = ImagePopulator::new(
            collection.clone(),
            Arc::clone(&coordinator),
            cache,
            handoff_tx,
        );

        Self {
            navigation: Navigation::new(start_uri),
            collection,
            coordinator,
            populator,
            handoff_rx,
            placeholders: Placeholders::new(image_width),
            filter: FilterView::new(),
            visible: Vec::new(),
        }
    }

    pub fn navigation(&self) -> &Navigation {
        &self.navigation
    }

    pub fn current_uri(&self) -> &str {
        self.navigation.current_uri()
    }

    /// Handle on the live collection, for readers.
    pub fn collection(&self) -> &Collection {
        &self.collection
    }

    pub fn coordinator(&self) -> &Arc<Coordinator> {
        &self.coordinator
    }

    pub fn image_width(&self) -> u32 {
        self.placeholders.width()
    }

    /// Move to `uri`. Returns true when the location changed and its data
    /// should be fetched.
    pub fn navigate(&mut self, uri: &str, history: bool) -> bool {
        self.navigation.show(uri, history)
    }

    /// Go back one level. Returns the location to fetch, if any.
    pub fn navigate_back(&mut self) -> Option<String> {
        self.navigation.goto_parent()
    }

    /// A location's data arrived, or turned out not to exist.
    pub fn data_refreshed(&mut self, uri: &str, listing: Option<&LocationListing>) -> RefreshOutcome {
        if !self.navigation.is_current(uri) {
            debug!(uri, current = %self.navigation.current_uri(), "Ignoring data for another location");
            return RefreshOutcome::Ignored;
        }

        match listing {
            Some(listing) => self.rebuild(listing),
            None if self.navigation.is_current(ROOT_URI) => {
                warn!("Root location is missing");
                RefreshOutcome::Missing
            }
            None => {
                warn!(uri, "Library browser redirected to root location");
                self.navigation.show(ROOT_URI, false);
                RefreshOutcome::Redirect {
                    to: ROOT_URI.to_string(),
                }
            }
        }
    }

    /// Replace the live collection with `listing`.
    ///
    /// Cancels any populate pass and blocks until it has let go.
    pub fn rebuild(&mut self, listing: &LocationListing) -> RefreshOutcome {
        let guard = self.coordinator.acquire_build();

        if !self.navigation.is_current(&listing.uri) {
            debug!(uri = %listing.uri, "Location changed during build, discarding");
            return RefreshOutcome::Discarded;
        }

        let built = StoreBuilder::build(listing, &self.placeholders);
        let generation = self.collection.replace(&built.location, built.entries);
        drop(guard);

        self.refilter();
        info!(
            location = %built.location,
            generation,
            entries = self.collection.len(),
            "Library store updated"
        );

        RefreshOutcome::Built {
            image_requests: built.image_requests,
        }
    }

    /// Start a populate pass at the current width.
    pub fn request_population(&self, force: bool) -> PassHandle {
        self.populator.spawn(self.placeholders.clone(), force)
    }

    /// New artwork files exist on disk.
    pub fn images_available(&self) -> PassHandle {
        self.request_population(false)
    }

    /// Change the target width. Re-renders placeholders and forces a re-decode
    /// of every entry.
    pub fn set_image_width(&mut self, width: u32) -> Option<PassHandle> {
        if width == self.placeholders.width() {
            return None;
        }

        debug!(width, "Image size changed");
        self.placeholders = Placeholders::new(width);
        Some(self.request_population(true))
    }

    /// Apply queued handoffs. Returns how many landed.
    pub fn drain_handoffs(&mut self) -> usize {
        let mut applied = 0;
        for handoff in self.handoff_rx.try_iter().take(HANDOFF_CAPACITY) {
            let uri = handoff.uri.clone();
            if self.collection.apply(handoff) {
                applied += 1;
            } else {
                debug!(uri = %uri, "Dropping stale image handoff");
            }
        }
        applied
    }

    /// Whether no pass is queued or running and nothing waits to be applied.
    pub fn is_idle(&self) -> bool {
        self.populator.active_passes() == 0 && self.handoff_rx.is_empty()
    }

    pub fn filter_text(&self) -> &str {
        self.filter.text()
    }

    /// Returns false when the trimmed text did not change.
    pub fn set_filter_text(&mut self, text: &str) -> bool {
        if !self.filter.set_text(text) {
            return false;
        }
        self.refilter();
        true
    }

    /// Collection indices of the visible entries.
    pub fn visible_indices(&self) -> &[usize] {
        &self.visible
    }

    pub fn visible_entries(&self) -> Vec<Entry> {
        let state = self.collection.read();
        self.visible
            .iter()
            .filter_map(|&index| state.entries.get(index).cloned())
            .collect()
    }

    /// What activating the visible entry at `position` should do.
    pub fn activate(&self, position: usize) -> Activation {
        let state = self.collection.read();
        match self.visible.get(position).and_then(|&i| state.entries.get(i)) {
            Some(entry) => {
                debug!(uri = %entry.uri, kind = ?entry.kind, "Selected item");
                Activation::for_entry(entry.kind, &entry.uri)
            }
            None => Activation::Nothing,
        }
    }

    fn refilter(&mut self) {
        let state = self.collection.read();
        self.visible = self.filter.visible_indices(&state.entries);
    }
}
