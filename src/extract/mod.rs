//! Item extraction from rendered listing pages
//!
//! The crawl engine only depends on the `ItemExtractor` trait. `SelectorExtractor`
//! is the default implementation, driven by the CSS selectors of each source's
//! `[source.extract]` table.

mod selector;

use crate::browser::RenderedPage;
use crate::catalog::RawItem;
use crate::config::SourceConfig;
use thiserror::Error;

pub use selector::SelectorExtractor;

/// Errors raised while turning a rendered page into items
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExtractionError {
    #[error("invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("{matched} item elements matched but none had a title")]
    NoUsableItems { matched: usize },
}

/// Turns one rendered page into raw item records
pub trait ItemExtractor: Send + Sync {
    /// Extracts the items of a page in document order
    ///
    /// # Arguments
    ///
    /// * `page` - Rendered DOM and the address it was loaded from
    /// * `source` - Source whose rules apply
    /// * `step` - Page number or scroll step recorded on each item
    fn extract(
        &self,
        page: &RenderedPage,
        source: &SourceConfig,
        step: u32,
    ) -> Result<Vec<RawItem>, ExtractionError>;
}
