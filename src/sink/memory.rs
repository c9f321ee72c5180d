//! In-memory catalog sink
//!
//! Backs `--dry-run` and the tests. Upsert and baseline failures can be
//! injected to exercise the orchestrator's error paths.

use crate::catalog::{CatalogItem, Snapshot};
use crate::output::{RunReport, RunStatus};
use crate::sink::traits::{CatalogSink, SinkError, SinkResult};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

#[derive(Default)]
struct MemoryState {
    baselines: HashMap<String, Snapshot>,
    items: HashMap<String, BTreeMap<String, CatalogItem>>,
    runs: Vec<RunReport>,
    failing_upserts: usize,
    corrupt_baseline: Option<String>,
}

/// Catalog sink that keeps everything in process memory
#[derive(Default)]
pub struct MemorySink {
    state: Mutex<MemoryState>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with `snapshot` as the baseline of `source_group`
    pub fn with_baseline(source_group: &str, snapshot: Snapshot) -> Self {
        let sink = Self::new();
        if let Ok(mut state) = sink.state.lock() {
            state.baselines.insert(source_group.to_string(), snapshot);
        }
        sink
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".to_string()))
    }

    /// Makes the next `count` upsert calls fail
    pub fn fail_upserts(&self, count: usize) {
        if let Ok(mut state) = self.state.lock() {
            state.failing_upserts = count;
        }
    }

    /// Makes `load_baseline` report a corrupt baseline
    pub fn corrupt_baseline(&self, reason: &str) {
        if let Ok(mut state) = self.state.lock() {
            state.corrupt_baseline = Some(reason.to_string());
        }
    }

    /// Items currently stored for `source_group`
    pub fn items(&self, source_group: &str) -> Vec<CatalogItem> {
        self.state
            .lock()
            .map(|state| {
                state
                    .items
                    .get(source_group)
                    .map(|items| items.values().cloned().collect())
                    .unwrap_or_default()
            })
            .unwrap_or_default()
    }

    /// Reports of every recorded run, oldest first
    pub fn runs(&self) -> Vec<RunReport> {
        self.state
            .lock()
            .map(|state| state.runs.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CatalogSink for MemorySink {
    async fn load_baseline(&self, source_group: &str) -> SinkResult<Option<Snapshot>> {
        let state = self.lock()?;
        if let Some(reason) = &state.corrupt_baseline {
            return Err(SinkError::CorruptBaseline(reason.clone()));
        }
        Ok(state.baselines.get(source_group).cloned())
    }

    async fn upsert(&self, source_group: &str, items: &[CatalogItem]) -> SinkResult<usize> {
        let mut state = self.lock()?;
        if state.failing_upserts > 0 {
            state.failing_upserts -= 1;
            return Err(SinkError::Unavailable("injected upsert failure".to_string()));
        }

        let stored = state.items.entry(source_group.to_string()).or_default();
        for item in items {
            stored.insert(item.id.clone(), item.clone());
        }
        Ok(items.len())
    }

    async fn record_run(&self, report: &RunReport, snapshot: &Snapshot) -> SinkResult<()> {
        let mut state = self.lock()?;
        if report.status == RunStatus::Completed {
            state
                .baselines
                .insert(report.source_group.clone(), snapshot.clone());
        }
        state.runs.push(report.clone());
        Ok(())
    }
}
