pub mod browser;
pub mod coordinator;
pub mod filter;
pub mod navigation;
pub mod populator;
pub mod store_builder;

pub use browser::{LibraryBrowser, RefreshOutcome};
pub use coordinator::{AccessGuard, AccessKind, Coordinator, Ticket};
pub use filter::FilterView;
pub use navigation::{Activation, Navigation, ROOT_URI};
pub use populator::{ImagePopulator, PassHandle, PassReport, HANDOFF_CAPACITY};
pub use store_builder::{BuiltStore, ImageRequest, StoreBuilder};
