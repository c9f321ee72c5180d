use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One item record as extracted from a listing page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawItem {
    pub source_id: String,

    /// Page number (paged mode) or scroll step (infinite-scroll mode)
    pub step: u32,

    /// Index of the item within its page, starting at 0
    pub position: u32,

    pub title: String,

    #[serde(default)]
    pub price_text: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    pub scraped_at: DateTime<Utc>,
}

impl RawItem {
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}

/// A deduplicated catalog entry with its resolved identity and content hash
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    /// Stable identifier, namespaced by source
    pub id: String,

    /// False when the id is positional and cannot be matched across runs
    pub stable_id: bool,

    /// SHA-256 over the semantic fields; see `ContentHasher`
    pub content_hash: String,

    pub source_id: String,
    pub step: u32,
    pub position: u32,
    pub title: String,

    #[serde(default)]
    pub price_text: Option<String>,

    #[serde(default)]
    pub link: Option<String>,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,

    pub scraped_at: DateTime<Utc>,
}

impl CatalogItem {
    /// Promotes a raw item once its identity and hash are known
    pub fn from_raw(raw: RawItem, id: String, stable_id: bool, content_hash: String) -> Self {
        Self {
            id,
            stable_id,
            content_hash,
            source_id: raw.source_id,
            step: raw.step,
            position: raw.position,
            title: raw.title,
            price_text: raw.price_text,
            link: raw.link,
            attributes: raw.attributes,
            scraped_at: raw.scraped_at,
        }
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }
}
