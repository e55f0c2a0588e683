use tracing::{debug, warn};

use crate::models::EntryKind;

/// URI of the library root.
pub const ROOT_URI: &str = "";

/// Current location plus the parent stack used for back navigation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Navigation {
    current_uri: String,
    parent_uris: Vec<String>,
}

impl Navigation {
    pub fn new(start_uri: impl Into<String>) -> Self {
        Self {
            current_uri: start_uri.into(),
            parent_uris: Vec::new(),
        }
    }

    pub fn current_uri(&self) -> &str {
        &self.current_uri
    }

    pub fn parent_uris(&self) -> &[String] {
        &self.parent_uris
    }

    pub fn is_current(&self, uri: &str) -> bool {
        self.current_uri == uri
    }

    /// Move to `uri`. Returns false when it is already the current location.
    ///
    /// With `history`, the location being left is pushed unless it already
    /// tops the stack.
    pub fn show(&mut self, uri: &str, history: bool) -> bool {
        if uri == self.current_uri {
            return false;
        }

        if history && self.parent_uris.last() != Some(&self.current_uri) {
            self.parent_uris.push(self.current_uri.clone());
        }

        debug!(uri, parents = ?self.parent_uris, "Will show location");
        self.current_uri = uri.to_string();
        true
    }

    /// Go back one level. Returns the new location, if it changed.
    pub fn goto_parent(&mut self) -> Option<String> {
        if self.current_uri == ROOT_URI {
            return None;
        }

        match self.parent_uris.pop() {
            Some(parent) => {
                self.show(&parent, false);
                Some(parent)
            }
            None => {
                warn!(uri = %self.current_uri, "No parent location to go back to");
                None
            }
        }
    }
}

/// What activating an entry asks the application to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Activation {
    /// Show the details of an album.
    ShowAlbum { uri: String },
    /// Browse into a location (history is recorded).
    Navigate { uri: String },
    /// Replace the tracklist and play.
    Play { uris: Vec<String> },
    Nothing,
}

impl Activation {
    pub fn for_entry(kind: EntryKind, uri: &str) -> Self {
        match kind {
            EntryKind::Album => Self::ShowAlbum {
                uri: uri.to_string(),
            },
            EntryKind::Directory => Self::Navigate {
                uri: uri.to_string(),
            },
            EntryKind::Track => Self::Play {
                uris: vec![uri.to_string()],
            },
            EntryKind::Playlist => Self::Nothing,
        }
    }
}
