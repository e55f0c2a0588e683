//! Mopidy collaborators: JSON-RPC transport, location source, artwork
//! downloads.

pub mod client;
pub mod images;
pub mod source;

#[cfg(test)]
pub(crate) mod stub;

pub use client::{next_command_id, CommandError, MopidyClient};
pub use images::ImageDownloader;
pub use source::{LocationFetch, MopidyLibrary};
