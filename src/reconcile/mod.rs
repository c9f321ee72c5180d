//! Differential reconciliation
//!
//! Compares the current snapshot against the previous run's baseline and
//! classifies every item as added, updated, unchanged or removed.

mod changeset;

use crate::catalog::{ContentHasher, Snapshot};
use crate::config::CatalogConfig;

pub use changeset::{BaselineStatus, ChangeSet, ItemUpdate};

/// The previous run's snapshot, as far as it could be loaded
#[derive(Debug, Clone)]
pub enum Baseline {
    Available(Snapshot),
    Missing,
    Corrupt(String),
}

impl Baseline {
    fn snapshot(&self) -> Option<&Snapshot> {
        match self {
            Self::Available(snapshot) => Some(snapshot),
            _ => None,
        }
    }

    fn status(&self) -> BaselineStatus {
        match self {
            Self::Available(_) => BaselineStatus::Available,
            Self::Missing => BaselineStatus::Missing,
            Self::Corrupt(reason) => BaselineStatus::Corrupt(reason.clone()),
        }
    }
}

/// Computes change sets; carries the field list used to name changed fields
#[derive(Debug, Clone)]
pub struct DifferentialReconciler {
    hasher: ContentHasher,
}

impl Default for DifferentialReconciler {
    fn default() -> Self {
        Self::new(ContentHasher::new(CatalogConfig::default().hash_fields))
    }
}

impl DifferentialReconciler {
    pub fn new(hasher: ContentHasher) -> Self {
        Self { hasher }
    }

    /// Reconciles `current` against `baseline`
    ///
    /// Without a usable baseline every current item is added and nothing is
    /// removed. The result is a pure function of the two inputs.
    pub fn reconcile(&self, baseline: &Baseline, current: &Snapshot) -> ChangeSet {
        let empty = Snapshot::new();
        let previous = baseline.snapshot().unwrap_or(&empty);

        let mut changes = self.diff(previous, current);
        changes.baseline_status = baseline.status();
        if baseline.snapshot().is_none() {
            changes.completion_rate = None;
        }
        changes
    }

    /// Reconciles two snapshots, treating `baseline` as available
    pub fn reconcile_snapshots(&self, baseline: &Snapshot, current: &Snapshot) -> ChangeSet {
        self.diff(baseline, current)
    }

    fn diff(&self, baseline: &Snapshot, current: &Snapshot) -> ChangeSet {
        let mut added = Vec::new();
        let mut updated = Vec::new();
        let mut unchanged = 0;
        let mut untracked = 0;

        for item in current.items() {
            // Positional ids name a slot, not an item; never match them
            if !item.stable_id {
                untracked += 1;
                added.push(item.clone());
                continue;
            }

            match baseline.get(&item.id) {
                None => added.push(item.clone()),
                Some(before) if before.content_hash != item.content_hash => {
                    let mut changed_fields = self.hasher.changed_fields(before, item);
                    if changed_fields.is_empty() {
                        changed_fields.push("content".to_string());
                    }
                    updated.push(ItemUpdate {
                        before: before.clone(),
                        after: item.clone(),
                        changed_fields,
                    });
                }
                Some(_) => unchanged += 1,
            }
        }

        let removed = baseline
            .items()
            .filter(|item| item.stable_id && !current.contains(&item.id))
            .cloned()
            .collect();

        let completion_rate = if baseline.is_empty() {
            None
        } else {
            Some(current.len() as f64 / baseline.len() as f64)
        };

        ChangeSet {
            added,
            updated,
            removed,
            unchanged,
            completion_rate,
            baseline_status: BaselineStatus::Available,
            untracked,
        }
    }
}

/// Reconciles with the default classification fields
pub fn reconcile(baseline: &Baseline, current: &Snapshot) -> ChangeSet {
    DifferentialReconciler::default().reconcile(baseline, current)
}

/// Reconciles two snapshots with the default classification fields
pub fn reconcile_snapshots(baseline: &Snapshot, current: &Snapshot) -> ChangeSet {
    DifferentialReconciler::default().reconcile_snapshots(baseline, current)
}
