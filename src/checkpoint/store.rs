use crate::catalog::CatalogItem;
use crate::checkpoint::{
    atomic_write, CheckpointError, CheckpointRecord, ItemJournal, SourceProgress,
};
use crate::config::{SourceConfig, TraversalMode};
use crate::state::{RunCounters, SourceState};
use crate::traversal::{Cursor, TraversalOutcome};
use crate::SweepError;
use chrono::Utc;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Durable crawl progress for one source group
///
/// Holds the checkpoint record, the items recorded so far (grouped by source,
/// in emission order) and the journal backing them. Saves are atomic: the
/// journal is synced first, then the record is written to a temporary file and
/// renamed over the previous one.
pub struct CrawlCheckpoint {
    path: PathBuf,
    interval: u32,
    record: CheckpointRecord,
    journal: ItemJournal,
    items: BTreeMap<String, Vec<CatalogItem>>,
    items_since_save: u32,
    resumed: bool,
}

impl CrawlCheckpoint {
    /// Reads a checkpoint record from disk
    ///
    /// # Returns
    ///
    /// * `Ok(Some(record))` - A readable record exists
    /// * `Ok(None)` - No record at `path`
    /// * `Err(CheckpointError)` - The record exists but cannot be read
    pub fn load(path: &Path) -> Result<Option<CheckpointRecord>, CheckpointError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let record = serde_json::from_str(&content)
            .map_err(|e| CheckpointError::Corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(Some(record))
    }

    /// Opens the checkpoint for a run
    ///
    /// With `resume`, a record written for the same group and configuration
    /// is continued: its items are restored from the journal and infinite-scroll
    /// sources that were interrupted are reset to pending. Anything else starts
    /// a fresh record and discards the old files.
    ///
    /// # Arguments
    ///
    /// * `path` - Location of the checkpoint record
    /// * `interval` - New items between two saves
    /// * `source_group` - Group the run crawls
    /// * `config_hash` - Hash of the configuration the run uses
    /// * `sources` - Configured sources, in configuration order
    /// * `resume` - Continue a matching record instead of starting over
    pub fn open(
        path: &Path,
        interval: u32,
        source_group: &str,
        config_hash: &str,
        sources: &[SourceConfig],
        resume: bool,
    ) -> Result<Self, CheckpointError> {
        let mut journal = ItemJournal::new(journal_path(path));

        let existing = if resume {
            match Self::load(path) {
                Ok(record) => record,
                Err(e) => {
                    tracing::warn!("Ignoring unreadable checkpoint: {}", e);
                    None
                }
            }
        } else {
            None
        };

        if let Some(record) = existing {
            if record.matches(source_group, config_hash) {
                let mut checkpoint = Self {
                    path: path.to_path_buf(),
                    interval,
                    record,
                    journal,
                    items: BTreeMap::new(),
                    items_since_save: 0,
                    resumed: true,
                };
                checkpoint.restore(sources)?;
                return Ok(checkpoint);
            }

            tracing::warn!(
                "Checkpoint at {} was written for a different configuration; starting fresh",
                path.display()
            );
        }

        journal.remove()?;
        let record = CheckpointRecord::new(
            source_group,
            config_hash,
            sources.iter().map(|s| s.id.as_str()),
        );

        let mut checkpoint = Self {
            path: path.to_path_buf(),
            interval,
            record,
            journal,
            items: BTreeMap::new(),
            items_since_save: 0,
            resumed: false,
        };
        checkpoint.save()?;
        Ok(checkpoint)
    }

    pub fn is_resumed(&self) -> bool {
        self.resumed
    }

    pub fn record(&self) -> &CheckpointRecord {
        &self.record
    }

    pub fn counters(&self) -> &RunCounters {
        &self.record.counters
    }

    pub fn counters_mut(&mut self) -> &mut RunCounters {
        &mut self.record.counters
    }

    /// True when `id` was already recorded in this run
    pub fn is_processed(&self, id: &str) -> bool {
        self.record.emitted_ids.contains(id)
    }

    pub fn source_progress(&self, source_id: &str) -> Option<&SourceProgress> {
        self.record.sources.get(source_id)
    }

    /// Moves a source to `next`, validating the transition, and saves
    pub fn set_source_state(
        &mut self,
        source_id: &str,
        next: SourceState,
        outcome: Option<TraversalOutcome>,
        error: Option<String>,
    ) -> Result<(), SweepError> {
        let progress = self
            .record
            .sources
            .get_mut(source_id)
            .ok_or_else(|| SweepError::UnknownSource(source_id.to_string()))?;

        if !progress.state.can_transition_to(next) {
            return Err(SweepError::InvalidTransition {
                source_id: source_id.to_string(),
                from: progress.state,
                to: next,
            });
        }

        progress.state = next;
        progress.outcome = outcome;
        progress.error = error;
        self.save()?;
        Ok(())
    }

    /// Records the items of one completed page or scroll step
    ///
    /// Items whose id was already recorded are dropped and counted as
    /// duplicates. Returns the number of items accepted.
    pub fn record_page(
        &mut self,
        source_id: &str,
        cursor: Cursor,
        items: Vec<CatalogItem>,
    ) -> Result<usize, SweepError> {
        if !self.record.sources.contains_key(source_id) {
            return Err(SweepError::UnknownSource(source_id.to_string()));
        }

        let mut accepted = 0;
        for item in items {
            if self.record.emitted_ids.contains(&item.id) {
                self.record.counters.duplicates_dropped += 1;
                continue;
            }
            self.journal.append(&item)?;
            self.record.emitted_ids.insert(item.id.clone());
            self.items
                .entry(source_id.to_string())
                .or_default()
                .push(item);
            accepted += 1;
        }

        if let Some(progress) = self.record.sources.get_mut(source_id) {
            progress.cursor = Some(cursor);
            progress.items_emitted += accepted as u64;
        }
        self.record.counters.items_processed += accepted as u64;
        self.items_since_save += accepted as u32;

        Ok(accepted)
    }

    /// True once enough new items were recorded since the last save
    pub fn should_save(&self) -> bool {
        self.items_since_save >= self.interval
    }

    /// Writes the record atomically after syncing the journal
    pub fn save(&mut self) -> Result<(), CheckpointError> {
        self.journal.sync()?;
        self.record.updated_at = Utc::now();

        let json = serde_json::to_string_pretty(&self.record)?;
        atomic_write(&self.path, format!("{}\n", json).as_bytes())?;

        self.items_since_save = 0;
        tracing::debug!(
            "Checkpoint saved: {} items across {} sources",
            self.record.emitted_ids.len(),
            self.record.sources.len()
        );
        Ok(())
    }

    /// Items recorded for one source, in emission order
    pub fn items_for(&self, source_id: &str) -> &[CatalogItem] {
        self.items.get(source_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Per-source item lists in the order of `source_ids`
    pub fn item_lists(&self, source_ids: &[String]) -> Vec<Vec<CatalogItem>> {
        source_ids
            .iter()
            .map(|id| self.items_for(id).to_vec())
            .collect()
    }

    /// Archives the record as `<path>.prev` and deletes the live files
    ///
    /// Called after a run finished; the next run starts fresh.
    pub fn rotate(mut self) -> Result<(), CheckpointError> {
        self.record.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(&self.record)?;
        atomic_write(&previous_path(&self.path), format!("{}\n", json).as_bytes())?;

        self.journal.remove()?;
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    fn restore(&mut self, sources: &[SourceConfig]) -> Result<(), CheckpointError> {
        for source in sources {
            if !self.record.sources.contains_key(&source.id) {
                self.record
                    .sources
                    .insert(source.id.clone(), SourceProgress::pending());
            }
        }

        let restarted: Vec<&str> = sources
            .iter()
            .filter(|s| s.mode == TraversalMode::InfiniteScroll)
            .filter(|s| {
                self.record
                    .sources
                    .get(&s.id)
                    .map(|p| p.state == SourceState::InProgress)
                    .unwrap_or(false)
            })
            .map(|s| s.id.as_str())
            .collect();

        let mut kept = std::collections::BTreeSet::new();
        for item in self.journal.read_all()? {
            if restarted.contains(&item.source_id.as_str()) {
                continue;
            }
            if !self.record.emitted_ids.contains(&item.id) || !kept.insert(item.id.clone()) {
                continue;
            }
            self.items
                .entry(item.source_id.clone())
                .or_default()
                .push(item);
        }

        for source_id in &restarted {
            tracing::info!(
                "Infinite-scroll source '{}' was interrupted and restarts from the top",
                source_id
            );
            if let Some(progress) = self.record.sources.get_mut(*source_id) {
                *progress = SourceProgress::pending();
            }
        }

        for progress in self.record.sources.values_mut() {
            progress.items_emitted = 0;
        }
        for (source_id, list) in &self.items {
            if let Some(progress) = self.record.sources.get_mut(source_id) {
                progress.items_emitted = list.len() as u64;
            }
        }

        // Ids whose items never reached the journal are forgotten, so their
        // pages are crawled again.
        self.record.emitted_ids = kept;
        self.record.counters.items_processed = self.record.emitted_ids.len() as u64;

        self.journal.rewrite(self.items.values().flatten())?;

        tracing::info!(
            "Resuming run {}: {} items restored",
            self.record.run_id,
            self.record.emitted_ids.len()
        );
        self.save()
    }
}

fn journal_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".items.jsonl");
    PathBuf::from(name)
}

fn previous_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".prev");
    PathBuf::from(name)
}
