//! Catalog data model
//!
//! Raw extracted items, deduplicated catalog items, content hashing and the
//! per-run snapshot.

mod hash;
mod item;
mod snapshot;

pub use hash::ContentHasher;
pub use item::{CatalogItem, RawItem};
pub use snapshot::Snapshot;
