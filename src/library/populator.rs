//! Background passes that replace placeholders with decoded artwork.
//!
//! - One short-lived thread per pass
//! - Passes queue on the coordinator, so they never overlap each other or a
//!   rebuild
//! - Cancellation is checked before every entry
//! - Results go to the coordinating thread over a bounded handoff channel

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::{SendTimeoutError, Sender};
use tracing::{debug, error, info, warn};

use super::coordinator::{AccessGuard, AccessKind, Coordinator, Ticket};
use crate::images::{Artwork, ImageCache, Placeholders};
use crate::models::{Collection, Entry, ImageHandoff};

/// Maximum number of handoffs waiting for the coordinating thread.
pub const HANDOFF_CAPACITY: usize = 256;

/// How long a worker waits on a full handoff queue before re-checking
/// cancellation.
const HANDOFF_RETRY: Duration = Duration::from_millis(16);

/// Outcome of one populate pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub width: u32,
    pub force: bool,
    /// Entries examined before the pass ended.
    pub visited: usize,
    /// Image cache lookups issued.
    pub lookups: usize,
    /// Lookups that produced artwork.
    pub resolved: usize,
    pub cancelled: bool,
}

/// Handle on a running pass.
#[derive(Debug)]
pub struct PassHandle {
    handle: Option<JoinHandle<PassReport>>,
}

impl PassHandle {
    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Wait for the pass to end.
    pub fn join(self) -> PassReport {
        match self.handle {
            Some(handle) => handle.join().unwrap_or_else(|_| {
                error!("Image population pass panicked");
                PassReport::default()
            }),
            None => PassReport::default(),
        }
    }
}

/// Spawns populate passes over one collection.
pub struct ImagePopulator {
    collection: Collection,
    coordinator: Arc<Coordinator>,
    cache: ImageCache,
    handoff_tx: Sender<ImageHandoff>,
    active: Arc<AtomicUsize>,
    next_pass: AtomicU64,
}

impl ImagePopulator {
    pub fn new(
        collection: Collection,
        coordinator: Arc<Coordinator>,
        cache: ImageCache,
        handoff_tx: Sender<ImageHandoff>,
    ) -> Self {
        Self {
            collection,
            coordinator,
            cache,
            handoff_tx,
            active: Arc::new(AtomicUsize::new(0)),
            next_pass: AtomicU64::new(0),
        }
    }

    /// Start a pass at the placeholders' width.
    ///
    /// The place in line is taken before the thread starts, so passes run in
    /// the order they were requested.
    pub fn spawn(&self, placeholders: Placeholders, force: bool) -> PassHandle {
        let ticket = self.coordinator.ticket(AccessKind::Populate);
        let pass_id = self.next_pass.fetch_add(1, Ordering::Relaxed);

        self.active.fetch_add(1, Ordering::SeqCst);
        let pass = PopulatePass {
            collection: self.collection.clone(),
            coordinator: Arc::clone(&self.coordinator),
            cache: self.cache.clone(),
            handoff_tx: self.handoff_tx.clone(),
            placeholders,
            force,
            ticket: Some(ticket),
            active: Arc::clone(&self.active),
        };

        let spawned = thread::Builder::new()
            .name(format!("images-pass-{}", pass_id))
            .spawn(move || pass.run());

        match spawned {
            Ok(handle) => PassHandle {
                handle: Some(handle),
            },
            Err(e) => {
                error!(error = ?e, "Failed to spawn image population thread");
                PassHandle { handle: None }
            }
        }
    }

    /// Number of passes queued or running.
    pub fn active_passes(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

struct PopulatePass {
    collection: Collection,
    coordinator: Arc<Coordinator>,
    cache: ImageCache,
    handoff_tx: Sender<ImageHandoff>,
    placeholders: Placeholders,
    force: bool,
    ticket: Option<Ticket>,
    active: Arc<AtomicUsize>,
}

impl PopulatePass {
    fn run(mut self) -> PassReport {
        let width = self.placeholders.width();
        let mut report = PassReport {
            width,
            force: self.force,
            ..PassReport::default()
        };
        let Some(ticket) = self.ticket.take() else {
            return report;
        };

        // Waits for any ongoing rebuild or earlier pass.
        let guard = self.coordinator.acquire(ticket);
        debug!(width, force = self.force, "Updating library images");

        let generation = self.collection.generation();
        let len = self.collection.len();

        for index in 0..len {
            if guard.is_cancelled() {
                debug!(index, "Aborting update of images");
                report.cancelled = true;
                break;
            }

            let Some(entry) = self.collection.entry(index) else {
                break;
            };
            report.visited += 1;

            let Some(image) = self.resolve(&entry, &mut report) else {
                continue;
            };
            let handoff = ImageHandoff {
                generation,
                index,
                uri: entry.uri,
                image,
            };
            if !self.deliver(handoff, &guard) {
                report.cancelled = guard.is_cancelled();
                break;
            }
        }

        drop(guard);
        info!(
            width,
            visited = report.visited,
            resolved = report.resolved,
            cancelled = report.cancelled,
            "Library images pass finished"
        );
        report
    }

    /// Image to hand off for `entry`, if it should change.
    fn resolve(&self, entry: &Entry, report: &mut PassReport) -> Option<Artwork> {
        let placeholder = self.placeholders.for_kind(entry.kind);

        let image = if !entry.kind.has_artwork() {
            placeholder
        } else if let Some(path) = entry.image_path() {
            if !self.force && !entry.has_placeholder() {
                return None;
            }
            report.lookups += 1;
            match self.cache.get(path, self.placeholders.width()) {
                Some(artwork) => {
                    report.resolved += 1;
                    artwork
                }
                None if entry.has_placeholder() => placeholder,
                None => return None,
            }
        } else {
            debug!(uri = %entry.uri, "No image path");
            placeholder
        };

        (!entry.image.same_as(&image)).then_some(image)
    }

    /// Queue a handoff, giving up if the pass gets cancelled while the queue
    /// is full.
    fn deliver(&self, mut handoff: ImageHandoff, guard: &AccessGuard<'_>) -> bool {
        loop {
            match self.handoff_tx.send_timeout(handoff, HANDOFF_RETRY) {
                Ok(()) => return true,
                Err(SendTimeoutError::Timeout(pending)) => {
                    if guard.is_cancelled() {
                        return false;
                    }
                    handoff = pending;
                }
                Err(SendTimeoutError::Disconnected(_)) => {
                    warn!("Image handoff queue disconnected");
                    return false;
                }
            }
        }
    }
}

impl Drop for PopulatePass {
    fn drop(&mut self) {
        // Never ran: give the place in line back.
        if let Some(ticket) = self.ticket.take() {
            self.coordinator.abandon(ticket);
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
    }
}
