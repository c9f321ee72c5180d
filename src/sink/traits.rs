//! Catalog sink trait and error types
//!
//! A sink is the downstream store of catalog items. It supplies the baseline
//! for reconciliation, receives the current snapshot as upserts and records
//! each finished run.

use crate::catalog::{CatalogItem, Snapshot};
use crate::output::RunReport;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur during sink operations
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Corrupt baseline: {0}")]
    CorruptBaseline(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for sink operations
pub type SinkResult<T> = Result<T, SinkError>;

/// Downstream store for catalog snapshots
///
/// Implementations must be safe to share between the orchestrator and tests,
/// so all methods take `&self`.
#[async_trait]
pub trait CatalogSink: Send + Sync {
    /// Loads the snapshot of the latest completed run of `source_group`
    ///
    /// # Returns
    ///
    /// * `Ok(Some(snapshot))` - A baseline exists
    /// * `Ok(None)` - No completed run has been recorded yet
    /// * `Err(SinkError::CorruptBaseline)` - A baseline exists but cannot be read
    async fn load_baseline(&self, source_group: &str) -> SinkResult<Option<Snapshot>>;

    /// Inserts or updates items in the latest catalog view
    ///
    /// # Returns
    ///
    /// The number of items written
    async fn upsert(&self, source_group: &str, items: &[CatalogItem]) -> SinkResult<usize>;

    /// Records a finished run together with its full snapshot
    async fn record_run(&self, report: &RunReport, snapshot: &Snapshot) -> SinkResult<()>;
}
