pub mod collection;
pub mod entry;

pub use collection::*;
pub use entry::*;
