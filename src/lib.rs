//! Library browser engine for a Mopidy remote client.

pub mod app;
pub mod images;
pub mod library;
pub mod models;
pub mod remote;
pub mod settings;
