//! Item identity
//!
//! Link canonicalization and stable id derivation.

mod link;
mod resolver;

pub use link::{absolutize_link, canonicalize_link};
pub use resolver::{IdentityResolver, ItemId};
