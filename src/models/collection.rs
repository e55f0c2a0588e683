use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard};

use super::Entry;
use crate::images::Artwork;

/// Image assignment computed off the coordinating thread.
///
/// The generation and URI pin the handoff to the collection instance and entry
/// it was computed for; anything else is stale and gets dropped.
#[derive(Debug, Clone)]
pub struct ImageHandoff {
    pub generation: u64,
    pub index: usize,
    pub uri: String,
    pub image: Artwork,
}

#[derive(Debug, Default)]
pub struct CollectionState {
    /// Bumped on every replace.
    pub generation: u64,
    pub location: String,
    pub entries: Vec<Entry>,
}

/// The live collection for the current location.
///
/// Cloning yields another handle to the same collection. Readers (the
/// presentation layer, populate passes) may take the read lock at any time;
/// writes happen only on the coordinating thread.
#[derive(Debug, Clone, Default)]
pub struct Collection {
    inner: Arc<RwLock<CollectionState>>,
}

impl Collection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CollectionState> {
        self.inner.read()
    }

    pub fn generation(&self) -> u64 {
        self.inner.read().generation
    }

    pub fn location(&self) -> String {
        self.inner.read().location.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.read().entries.is_empty()
    }

    pub fn entry(&self, index: usize) -> Option<Entry> {
        self.inner.read().entries.get(index).cloned()
    }

    pub fn snapshot(&self) -> Vec<Entry> {
        self.inner.read().entries.clone()
    }

    /// Replace the whole collection, returning the new generation.
    pub(crate) fn replace(&self, location: &str, entries: Vec<Entry>) -> u64 {
        let mut state = self.inner.write();
        state.generation = state.generation.wrapping_add(1);
        state.location = location.to_string();
        state.entries = entries;
        state.generation
    }

    /// Apply one handoff. Returns false when it is stale.
    pub(crate) fn apply(&self, handoff: ImageHandoff) -> bool {
        let mut state = self.inner.write();
        if state.generation != handoff.generation {
            return false;
        }
        match state.entries.get_mut(handoff.index) {
            Some(entry) if entry.uri == handoff.uri => {
                if !entry.image.same_as(&handoff.image) {
                    entry.image = handoff.image;
                }
                true
            }
            _ => false,
        }
    }
}
