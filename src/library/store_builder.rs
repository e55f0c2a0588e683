//! Turns a location listing into the ordered entries of a collection.

use std::path::PathBuf;

use tracing::trace;

use crate::images::Placeholders;
use crate::models::{normalize_filter_text, Entry, EntryKind, LocationListing, SourceRecord};

/// An entry that needs its artwork resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRequest {
    pub entry_uri: String,
    /// Where the artwork is, or will be once downloaded.
    pub image_source_path: PathBuf,
    /// Remote artwork to download, if any.
    pub image_uri: Option<String>,
}

/// A freshly built collection, ready to replace the live one.
#[derive(Debug)]
pub struct BuiltStore {
    pub location: String,
    pub entries: Vec<Entry>,
    pub image_requests: Vec<ImageRequest>,
}

/// Turns a location listing into collection entries.
pub struct StoreBuilder;

impl StoreBuilder {
    /// Map every record of `listing` to an entry, albums first, tracks last.
    ///
    /// Never fails: missing fields become empty text.
    pub fn build(listing: &LocationListing, placeholders: &Placeholders) -> BuiltStore {
        let mut entries = Vec::with_capacity(listing.len());
        let mut image_requests = Vec::new();

        for kind in EntryKind::ORDER {
            for record in listing.records(kind) {
                let entry = Self::build_entry(record, kind, placeholders);
                if let Some(path) = entry.image_path() {
                    image_requests.push(ImageRequest {
                        entry_uri: entry.uri.clone(),
                        image_source_path: path.to_path_buf(),
                        image_uri: record.image_uri.clone(),
                    });
                }
                entries.push(entry);
            }
        }

        trace!(
            location = %listing.uri,
            entries = entries.len(),
            with_images = image_requests.len(),
            "Built store entries"
        );

        BuiltStore {
            location: listing.uri.clone(),
            entries,
            image_requests,
        }
    }

    fn build_entry(record: &SourceRecord, kind: EntryKind, placeholders: &Placeholders) -> Entry {
        let display_name = record.name.clone().unwrap_or_default();
        let secondary_text = record.artist_name.clone().unwrap_or_default();

        Entry {
            uri: record.uri.clone(),
            filter_primary: normalize_filter_text(&display_name),
            filter_secondary: normalize_filter_text(&secondary_text),
            display_name,
            secondary_text,
            kind,
            image_source_path: record
                .image_source_path
                .clone()
                .filter(|path| !path.as_os_str().is_empty()),
            image: placeholders.for_kind(kind),
        }
    }
}
