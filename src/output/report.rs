//! Run reports
//!
//! A `RunReport` is the durable record of one crawl run. It is written as JSON to
//! `report-dir/report_<group>_<timestamp>.json`, stored in the catalog sink and
//! rendered into the markdown summary.

use crate::browser::PoolStats;
use crate::checkpoint::atomic_write;
use crate::output::{OutputError, OutputResult};
use crate::reconcile::ChangeSet;
use crate::state::{RunCounters, SourceState};
use crate::traversal::TraversalOutcome;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Overall status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Every source finished and the snapshot covers the baseline
    Completed,

    /// Reconciled, but some sources failed or coverage fell below the minimum
    Degraded,

    /// Stopped by the cancellation signal before reconciliation
    Interrupted,

    /// Aborted by a fatal error
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Degraded => "degraded",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "completed" => Some(Self::Completed),
            "degraded" => Some(Self::Degraded),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.to_db_string())
    }
}

/// Final state of one source within a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceReport {
    pub source_id: String,
    pub state: SourceState,
    pub outcome: Option<TraversalOutcome>,
    pub items: u64,
    pub error: Option<String>,
}

/// Everything known about a finished (or stopped) run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub source_group: String,
    pub config_hash: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,

    /// The run continued from a checkpoint
    pub resumed: bool,

    pub sources: Vec<SourceReport>,

    /// Items in the merged snapshot
    pub snapshot_size: usize,

    /// Absent when the run stopped before reconciliation
    pub changes: Option<ChangeSet>,

    pub counters: RunCounters,
    pub pool: PoolStats,
}

impl RunReport {
    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }

    pub fn failed_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|s| s.state == SourceState::Failed)
    }

    pub fn safety_limited_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources
            .iter()
            .filter(|s| s.state == SourceState::SafetyLimited)
    }

    /// File name used inside the report directory
    pub fn file_name(&self) -> String {
        format!(
            "report_{}_{}.json",
            self.source_group,
            self.finished_at.format("%Y%m%dT%H%M%SZ")
        )
    }

    /// Writes the report as pretty JSON into `dir`
    ///
    /// # Returns
    ///
    /// The path of the written file
    pub fn write_to_dir(&self, dir: &Path) -> OutputResult<PathBuf> {
        let path = dir.join(self.file_name());
        let json = serde_json::to_vec_pretty(self)?;
        atomic_write(&path, &json)?;
        Ok(path)
    }

    pub fn read_from(path: &Path) -> OutputResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Finds the most recent report for `source_group` in `dir`
///
/// Report names embed a sortable UTC timestamp, so the lexically greatest
/// name is the newest.
pub fn latest_report(dir: &Path, source_group: &str) -> OutputResult<Option<RunReport>> {
    if !dir.exists() {
        return Ok(None);
    }

    let prefix = format!("report_{}_", source_group);
    let mut newest: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if !name.starts_with(&prefix) || !name.ends_with(".json") {
            continue;
        }
        if newest.as_ref().map_or(true, |current| path > *current) {
            newest = Some(path);
        }
    }

    match newest {
        Some(path) => RunReport::read_from(&path).map(Some),
        None => Ok(None),
    }
}

/// Ensures a report directory exists, rejecting a path that is a file
pub fn prepare_report_dir(dir: &Path) -> OutputResult<()> {
    if dir.is_file() {
        return Err(OutputError::Write(format!(
            "report directory {} is a file",
            dir.display()
        )));
    }
    std::fs::create_dir_all(dir)?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn report(group: &str, finished_at: DateTime<Utc>) -> RunReport {
        RunReport {
            run_id: Uuid::new_v4(),
            source_group: group.to_string(),
            config_hash: "abc123".to_string(),
            started_at: finished_at - chrono::Duration::seconds(90),
            finished_at,
            status: RunStatus::Completed,
            resumed: false,
            sources: vec![
                SourceReport {
                    source_id: "shopping".to_string(),
                    state: SourceState::Completed,
                    outcome: Some(TraversalOutcome::EndMarker),
                    items: 12,
                    error: None,
                },
                SourceReport {
                    source_id: "games".to_string(),
                    state: SourceState::Failed,
                    outcome: None,
                    items: 0,
                    error: Some("timed out".to_string()),
                },
            ],
            snapshot_size: 12,
            changes: None,
            counters: RunCounters::new(),
            pool: PoolStats::default(),
        }
    }
}
