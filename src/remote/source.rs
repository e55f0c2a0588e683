//! Location data source backed by the Mopidy library API.

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::client::{browse_params, CommandError};
use super::{ImageDownloader, MopidyClient};
use crate::models::{EntryKind, LocationListing, SourceRecord};

/// Result of fetching one location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocationFetch {
    Found(LocationListing),
    /// The server does not know the location.
    NotFound,
    /// The server could not be reached. Nothing to do until the next attempt.
    Unavailable,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ref {
    #[serde(rename = "type")]
    pub ref_type: String,
    pub uri: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Artist {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AlbumInfo {
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Default, Deserialize)]
struct Track {
    #[serde(default)]
    artists: Vec<Artist>,
    #[serde(default)]
    album: Option<AlbumInfo>,
}

#[derive(Debug, Deserialize)]
struct Image {
    uri: String,
}

/// Loads location listings from a Mopidy server.
#[derive(Debug, Clone)]
pub struct MopidyLibrary {
    client: MopidyClient,
    images: ImageDownloader,
}

impl MopidyLibrary {
    pub fn new(client: MopidyClient, images: ImageDownloader) -> Self {
        Self { client, images }
    }

    pub fn images(&self) -> &ImageDownloader {
        &self.images
    }

    /// Fetch the complete listing of `uri`.
    ///
    /// Artist names and artwork are best effort: when their lookups fail the
    /// listing is still returned without them.
    pub async fn fetch(&self, uri: &str) -> LocationFetch {
        let refs = match self
            .client
            .call("core.library.browse", Some(browse_params(uri)))
            .await
        {
            Ok(Value::Null) => return LocationFetch::NotFound,
            Ok(refs) => refs,
            Err(CommandError::Http(e)) => {
                warn!(uri, error = %e, "Failed to browse location");
                return LocationFetch::Unavailable;
            }
            Err(e) => {
                debug!(uri, error = %e, "Location not found");
                return LocationFetch::NotFound;
            }
        };

        let refs: Vec<Ref> = match serde_json::from_value(refs) {
            Ok(refs) => refs,
            Err(e) => {
                warn!(uri, error = %e, "Unexpected browse reply");
                return LocationFetch::NotFound;
            }
        };

        let mut listing = listing_from_refs(uri, refs);
        let wanted: Vec<String> = [EntryKind::Album, EntryKind::Track]
            .into_iter()
            .flat_map(|kind| listing.records(kind).iter().map(|r| r.uri.clone()))
            .collect();

        if !wanted.is_empty() {
            if let Some(reply) = self.client.lookup(&wanted).await {
                apply_artists(&mut listing, &parse_map::<Vec<Track>>(reply));
            }
            if let Some(reply) = self.client.get_images(&wanted).await {
                apply_images(&mut listing, &parse_map::<Vec<Image>>(reply), &self.images);
            }
        }

        debug!(uri, items = listing.len(), "Fetched location");
        LocationFetch::Found(listing)
    }
}

/// Group refs by kind, keeping server order. Unknown ref types are skipped.
pub fn listing_from_refs(uri: &str, refs: Vec<Ref>) -> LocationListing {
    let mut listing = LocationListing::new(uri);
    for r in refs {
        match EntryKind::from_ref_type(&r.ref_type) {
            Some(kind) => listing.records_mut(kind).push(SourceRecord {
                uri: r.uri,
                name: r.name,
                ..SourceRecord::default()
            }),
            None => debug!(uri = %r.uri, ref_type = %r.ref_type, "Skipping ref"),
        }
    }
    listing
}

fn parse_map<T>(reply: Value) -> HashMap<String, T>
where
    T: for<'de> Deserialize<'de>,
{
    serde_json::from_value(reply).unwrap_or_else(|e| {
        warn!(error = %e, "Unexpected library reply");
        HashMap::new()
    })
}

fn join_names(artists: &[Artist]) -> Option<String> {
    let names: Vec<&str> = artists
        .iter()
        .filter_map(|artist| artist.name.as_deref())
        .filter(|name| !name.is_empty())
        .collect();
    (!names.is_empty()).then(|| names.join(", "))
}

/// Albums are credited to their album artists, tracks to their own.
fn artist_name(kind: EntryKind, tracks: &[Track]) -> Option<String> {
    let track = tracks.first()?;
    let album_artists = track.album.as_ref().and_then(|album| join_names(&album.artists));
    match kind {
        EntryKind::Album => album_artists.or_else(|| join_names(&track.artists)),
        _ => join_names(&track.artists).or(album_artists),
    }
}

fn apply_artists(listing: &mut LocationListing, tracks: &HashMap<String, Vec<Track>>) {
    for kind in [EntryKind::Album, EntryKind::Track] {
        for record in listing.records_mut(kind) {
            if let Some(found) = tracks.get(&record.uri) {
                record.artist_name = artist_name(kind, found);
            }
        }
    }
}

fn apply_images(
    listing: &mut LocationListing,
    images: &HashMap<String, Vec<Image>>,
    downloader: &ImageDownloader,
) {
    for kind in [EntryKind::Album, EntryKind::Track] {
        for record in listing.records_mut(kind) {
            let first = images
                .get(&record.uri)
                .and_then(|found| found.first())
                .filter(|image| !image.uri.is_empty());
            if let Some(image) = first {
                record.image_source_path = Some(downloader.local_path_for(&image.uri));
                record.image_uri = Some(image.uri.clone());
            }
        }
    }
}
