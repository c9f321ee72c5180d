use crate::catalog::CatalogItem;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An id-keyed, deduplicated catalog for one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    items: BTreeMap<String, CatalogItem>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts an item unless its id is already present
    ///
    /// Returns false when the item was a duplicate and was dropped.
    pub fn insert(&mut self, item: CatalogItem) -> bool {
        if self.items.contains_key(&item.id) {
            return false;
        }
        self.items.insert(item.id.clone(), item);
        true
    }

    /// Builds a snapshot from per-source item lists, in the order given
    ///
    /// Returns the snapshot and the number of duplicates dropped.
    pub fn merge<I>(lists: I) -> (Self, u64)
    where
        I: IntoIterator<Item = Vec<CatalogItem>>,
    {
        let mut snapshot = Self::new();
        let mut dropped = 0;
        for list in lists {
            for item in list {
                if !snapshot.insert(item) {
                    dropped += 1;
                }
            }
        }
        (snapshot, dropped)
    }

    pub fn get(&self, id: &str) -> Option<&CatalogItem> {
        self.items.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn items(&self) -> impl Iterator<Item = &CatalogItem> {
        self.items.values()
    }

    pub fn into_items(self) -> Vec<CatalogItem> {
        self.items.into_values().collect()
    }
}

impl FromIterator<CatalogItem> for Snapshot {
    fn from_iter<T: IntoIterator<Item = CatalogItem>>(iter: T) -> Self {
        let mut snapshot = Snapshot::new();
        for item in iter {
            snapshot.insert(item);
        }
        snapshot
    }
}
