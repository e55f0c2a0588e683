use std::time::Duration;

use anyhow::Result;
use mopbrowse::app::{AppConfig, BrowseApp};
use mopbrowse::library::ROOT_URI;
use mopbrowse::models::EntryKind;
use mopbrowse::settings::SettingsStore;

const IDLE_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("mopbrowse=info".parse()?),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let uri = args.next().unwrap_or_else(|| ROOT_URI.to_string());
    let filter = args.next().unwrap_or_default();

    let settings = SettingsStore::open_default()?;
    let config = AppConfig {
        start_uri: uri,
        ..AppConfig::from_settings(&settings)?
    };

    let mut app = BrowseApp::new(config)?;
    app.start();
    if !app.run_until_idle(IDLE_TIMEOUT) {
        tracing::warn!("Gave up waiting for the library to settle");
    }

    app.set_filter_text(&filter);
    for entry in app.visible_entries() {
        let kind = match entry.kind {
            EntryKind::Album => "album",
            EntryKind::Directory => "dir",
            EntryKind::Playlist => "playlist",
            EntryKind::Track => "track",
        };
        let art = if entry.has_placeholder() { "-" } else { "*" };
        if entry.secondary_text.is_empty() {
            println!("{} {:<8} {}  [{}]", art, kind, entry.display_name, entry.uri);
        } else {
            println!(
                "{} {:<8} {} - {}  [{}]",
                art, kind, entry.display_name, entry.secondary_text, entry.uri
            );
        }
    }
    Ok(())
}
