use std::path::{Path, PathBuf};

use crate::images::Artwork;

/// Kind of library item. Also the display order within a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Album,
    Directory,
    Playlist,
    Track,
}

impl EntryKind {
    /// Display order of the kind groups within a location.
    pub const ORDER: [EntryKind; 4] = [
        EntryKind::Album,
        EntryKind::Directory,
        EntryKind::Playlist,
        EntryKind::Track,
    ];

    /// Kinds whose entries may carry real artwork.
    pub fn has_artwork(self) -> bool {
        matches!(self, Self::Album | Self::Track)
    }

    /// Map a Mopidy `Ref.type` to an entry kind.
    ///
    /// Artists are browsable containers, so they are listed with directories.
    pub fn from_ref_type(ref_type: &str) -> Option<Self> {
        match ref_type {
            "album" => Some(Self::Album),
            "directory" | "artist" => Some(Self::Directory),
            "playlist" => Some(Self::Playlist),
            "track" => Some(Self::Track),
            _ => None,
        }
    }
}

/// Raw record for one item of a location, as supplied by the data source.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRecord {
    pub uri: String,
    pub name: Option<String>,
    pub artist_name: Option<String>,
    /// Remote artwork URI, used by the downloader.
    pub image_uri: Option<String>,
    /// Local file the artwork is (or will be) stored at.
    pub image_source_path: Option<PathBuf>,
}

impl SourceRecord {
    pub fn new(uri: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_artist(mut self, artist_name: impl Into<String>) -> Self {
        self.artist_name = Some(artist_name.into());
        self
    }

    pub fn with_image_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_source_path = Some(path.into());
        self
    }
}

/// Complete listing of one location, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LocationListing {
    pub uri: String,
    pub albums: Vec<SourceRecord>,
    pub directories: Vec<SourceRecord>,
    pub playlists: Vec<SourceRecord>,
    pub tracks: Vec<SourceRecord>,
}

impl LocationListing {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    pub fn records(&self, kind: EntryKind) -> &[SourceRecord] {
        match kind {
            EntryKind::Album => &self.albums,
            EntryKind::Directory => &self.directories,
            EntryKind::Playlist => &self.playlists,
            EntryKind::Track => &self.tracks,
        }
    }

    pub fn records_mut(&mut self, kind: EntryKind) -> &mut Vec<SourceRecord> {
        match kind {
            EntryKind::Album => &mut self.albums,
            EntryKind::Directory => &mut self.directories,
            EntryKind::Playlist => &mut self.playlists,
            EntryKind::Track => &mut self.tracks,
        }
    }

    pub fn len(&self) -> usize {
        self.albums.len() + self.directories.len() + self.playlists.len() + self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One browsable item of the live collection.
#[derive(Debug, Clone)]
pub struct Entry {
    /// Mopidy URI; unique within a collection.
    pub uri: String,
    /// Title, or empty when the server sent none.
    pub display_name: String,
    /// Artist names for albums and tracks, empty otherwise.
    pub secondary_text: String,
    pub kind: EntryKind,
    /// Local artwork file, once known.
    pub image_source_path: Option<PathBuf>,
    /// Placeholder or decoded artwork at the current width.
    pub image: Artwork,
    /// Lower-cased `display_name` for filtering.
    pub filter_primary: String,
    /// Lower-cased `secondary_text` for filtering.
    pub filter_secondary: String,
}

impl Entry {
    /// Artwork path, if the entry has a non-empty one.
    pub fn image_path(&self) -> Option<&Path> {
        self.image_source_path
            .as_deref()
            .filter(|path| !path.as_os_str().is_empty())
    }

    pub fn has_placeholder(&self) -> bool {
        self.image.is_placeholder()
    }

    /// Check the filter predicate against an already lower-cased needle.
    pub fn matches(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.filter_primary.contains(needle)
            || self.filter_secondary.contains(needle)
    }
}

/// Normalize text for case-insensitive filtering.
pub fn normalize_filter_text(text: &str) -> String {
    text.to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ref_type_mapping() {
        assert_eq!(EntryKind::from_ref_type("album"), Some(EntryKind::Album));
        assert_eq!(EntryKind::from_ref_type("artist"), Some(EntryKind::Directory));
        assert_eq!(EntryKind::from_ref_type("track"), Some(EntryKind::Track));
        assert_eq!(EntryKind::from_ref_type("radio"), None);
    }

    #[test]
    fn test_listing_records_by_kind() {
        let mut listing = LocationListing::new("local:directory");
        listing
            .records_mut(EntryKind::Playlist)
            .push(SourceRecord::new("m3u:a", "A"));

        assert_eq!(listing.len(), 1);
        assert_eq!(listing.records(EntryKind::Playlist)[0].uri, "m3u:a");
        assert!(listing.records(EntryKind::Album).is_empty());
    }

    #[test]
    fn test_artwork_kinds() {
        assert!(EntryKind::Album.has_artwork());
        assert!(EntryKind::Track.has_artwork());
        assert!(!EntryKind::Directory.has_artwork());
        assert!(!EntryKind::Playlist.has_artwork());
    }
}
