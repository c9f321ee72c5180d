use crate::catalog::CatalogItem;
use serde::{Deserialize, Serialize};

/// Whether a usable baseline existed when the change set was computed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "snake_case")]
pub enum BaselineStatus {
    Available,
    Missing,
    Corrupt(String),
}

/// One item whose content changed since the baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemUpdate {
    pub before: CatalogItem,
    pub after: CatalogItem,

    /// Semantic fields that differ, e.g. `["price", "condition"]`
    pub changed_fields: Vec<String>,
}

/// Difference between a baseline and the current snapshot
///
/// `added`, `updated` and `unchanged` partition the current ids; `removed`
/// holds the baseline ids absent from the current snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    pub added: Vec<CatalogItem>,
    pub updated: Vec<ItemUpdate>,
    pub removed: Vec<CatalogItem>,
    pub unchanged: usize,

    /// |current| / |baseline|; None without a non-empty baseline
    pub completion_rate: Option<f64>,

    pub baseline_status: BaselineStatus,

    /// Current items with positional ids; never matched across runs, so they are always added
    pub untracked: usize,
}

impl ChangeSet {
    /// Number of items in the current snapshot
    pub fn current_len(&self) -> usize {
        self.added.len() + self.updated.len() + self.unchanged
    }

    /// True unless the completion rate is known and below `min_rate`
    pub fn coverage_ok(&self, min_rate: f64) -> bool {
        match self.completion_rate {
            Some(rate) => rate >= min_rate,
            None => true,
        }
    }

    /// Share of current items that need no downstream processing
    pub fn efficiency_rate(&self) -> Option<f64> {
        let current = self.current_len();
        if current == 0 {
            return None;
        }
        Some(self.unchanged as f64 / current as f64)
    }

    /// Ids of added and updated items
    pub fn ids_to_process(&self) -> Vec<&str> {
        self.added
            .iter()
            .map(|item| item.id.as_str())
            .chain(self.updated.iter().map(|u| u.after.id.as_str()))
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.updated.is_empty() || !self.removed.is_empty()
    }
}
