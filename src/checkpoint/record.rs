use crate::state::{RunCounters, SourceState};
use crate::traversal::{Cursor, TraversalOutcome};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use uuid::Uuid;

/// Format version of the checkpoint record
pub const CHECKPOINT_VERSION: u32 = 1;

/// Progress of one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceProgress {
    pub state: SourceState,

    /// Where to continue; None until the first step completes
    #[serde(default)]
    pub cursor: Option<Cursor>,

    /// Items recorded for this source so far
    #[serde(default)]
    pub items_emitted: u64,

    #[serde(default)]
    pub outcome: Option<TraversalOutcome>,

    /// Last error for failed sources
    #[serde(default)]
    pub error: Option<String>,
}

impl SourceProgress {
    pub fn pending() -> Self {
        Self {
            state: SourceState::Pending,
            cursor: None,
            items_emitted: 0,
            outcome: None,
            error: None,
        }
    }
}

/// Durable progress of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub version: u32,
    pub run_id: Uuid,
    pub source_group: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    /// Keyed by source id
    pub sources: BTreeMap<String, SourceProgress>,

    /// Every item id recorded in this run
    pub emitted_ids: BTreeSet<String>,

    #[serde(default)]
    pub counters: RunCounters,
}

impl CheckpointRecord {
    pub fn new<'a, I>(source_group: &str, config_hash: &str, source_ids: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let now = Utc::now();
        Self {
            version: CHECKPOINT_VERSION,
            run_id: Uuid::new_v4(),
            source_group: source_group.to_string(),
            config_hash: config_hash.to_string(),
            started_at: now,
            updated_at: now,
            sources: source_ids
                .into_iter()
                .map(|id| (id.to_string(), SourceProgress::pending()))
                .collect(),
            emitted_ids: BTreeSet::new(),
            counters: RunCounters::default(),
        }
    }

    /// True when the record was written for this group and configuration
    pub fn matches(&self, source_group: &str, config_hash: &str) -> bool {
        self.version == CHECKPOINT_VERSION
            && self.source_group == source_group
            && self.config_hash == config_hash
    }

    pub fn all_terminal(&self) -> bool {
        self.sources.values().all(|p| p.state.is_terminal())
    }
}
