//! SQLite catalog sink
//!
//! Stores the latest view of every item, a history of runs and the snapshot of
//! recent runs. The baseline for the next reconciliation is the snapshot of the
//! latest run whose status is `completed`; degraded runs are recorded but never
//! become a baseline.

use crate::catalog::{CatalogItem, Snapshot};
use crate::output::{RunReport, RunStatus};
use crate::sink::schema::initialize_schema;
use crate::sink::traits::{CatalogSink, SinkError, SinkResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Number of most recent run snapshots kept besides the current baseline
const SNAPSHOT_RETENTION: i64 = 3;

/// One row of the run history
#[derive(Debug, Clone, PartialEq)]
pub struct RunRow {
    pub run_id: String,
    pub source_group: String,
    pub started_at: String,
    pub finished_at: String,
    pub status: RunStatus,
    pub item_count: i64,
    pub added: i64,
    pub updated: i64,
    pub removed: i64,
    pub unchanged: i64,
    pub completion_rate: Option<f64>,
}

/// SQLite-backed catalog sink
pub struct SqliteCatalogSink {
    conn: Mutex<Connection>,
}

impl SqliteCatalogSink {
    /// Opens or creates the catalog database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteCatalogSink)` - Successfully opened/created database
    /// * `Err(SinkError)` - Failed to open database
    pub fn open(path: &Path) -> SinkResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> SinkResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> SinkResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SinkError::Database("connection lock poisoned".to_string()))
    }

    /// Most recent runs, newest first
    ///
    /// # Arguments
    ///
    /// * `source_group` - Restrict to one group, or all groups when None
    /// * `limit` - Maximum number of rows
    pub fn recent_runs(&self, source_group: Option<&str>, limit: usize) -> SinkResult<Vec<RunRow>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT run_id, source_group, started_at, finished_at, status, item_count,
                    added, updated, removed, unchanged, completion_rate
             FROM runs
             WHERE ?1 IS NULL OR source_group = ?1
             ORDER BY id DESC
             LIMIT ?2",
        )?;

        let rows = stmt.query_map(params![source_group, limit as i64], |row| {
            let status: String = row.get(4)?;
            Ok((
                RunRow {
                    run_id: row.get(0)?,
                    source_group: row.get(1)?,
                    started_at: row.get(2)?,
                    finished_at: row.get(3)?,
                    status: RunStatus::Failed,
                    item_count: row.get(5)?,
                    added: row.get(6)?,
                    updated: row.get(7)?,
                    removed: row.get(8)?,
                    unchanged: row.get(9)?,
                    completion_rate: row.get(10)?,
                },
                status,
            ))
        })?;

        let mut runs = Vec::new();
        for row in rows {
            let (mut run, status) = row?;
            run.status = RunStatus::from_db_string(&status)
                .ok_or_else(|| SinkError::Database(format!("unknown run status '{}'", status)))?;
            runs.push(run);
        }
        Ok(runs)
    }

    /// Number of items in the latest catalog view of `source_group`
    pub fn item_count(&self, source_group: &str) -> SinkResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM catalog_items WHERE source_group = ?1",
            params![source_group],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    /// Recorded changes of a run as `(item_id, change)` pairs
    pub fn changes_for_run(&self, run_id: &str) -> SinkResult<Vec<(String, String)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT c.item_id, c.change
             FROM item_changes c JOIN runs r ON r.id = c.run_row
             WHERE r.run_id = ?1
             ORDER BY c.id",
        )?;
        let rows = stmt.query_map(params![run_id], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

fn read_baseline(conn: &Connection, source_group: &str) -> SinkResult<Option<Snapshot>> {
    let latest: Option<(i64, i64, String)> = conn
        .query_row(
            "SELECT id, item_count, run_id FROM runs
             WHERE source_group = ?1 AND status = ?2
             ORDER BY id DESC LIMIT 1",
            params![source_group, RunStatus::Completed.to_db_string()],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let Some((run_row, expected, run_id)) = latest else {
        return Ok(None);
    };

    let mut stmt =
        conn.prepare("SELECT item_id, payload FROM snapshot_items WHERE run_row = ?1")?;
    let rows = stmt.query_map(params![run_row], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut snapshot = Snapshot::new();
    for row in rows {
        let (item_id, payload) = row?;
        let item: CatalogItem = serde_json::from_str(&payload).map_err(|e| {
            SinkError::CorruptBaseline(format!(
                "run {}: unreadable snapshot item '{}': {}",
                run_id, item_id, e
            ))
        })?;
        if item.id != item_id {
            return Err(SinkError::CorruptBaseline(format!(
                "run {}: snapshot row '{}' holds item '{}'",
                run_id, item_id, item.id
            )));
        }
        snapshot.insert(item);
    }

    if snapshot.len() as i64 != expected {
        return Err(SinkError::CorruptBaseline(format!(
            "run {}: expected {} snapshot items, found {}",
            run_id,
            expected,
            snapshot.len()
        )));
    }

    Ok(Some(snapshot))
}

#[async_trait]
impl CatalogSink for SqliteCatalogSink {
    async fn load_baseline(&self, source_group: &str) -> SinkResult<Option<Snapshot>> {
        let conn = self.lock()?;
        read_baseline(&conn, source_group)
    }

    async fn upsert(&self, source_group: &str, items: &[CatalogItem]) -> SinkResult<usize> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO catalog_items (source_group, item_id, source_id, title, price_text,
                     link, attributes_json, content_hash, stable_id, first_seen_at, last_seen_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?10)
                 ON CONFLICT(source_group, item_id) DO UPDATE SET
                     source_id = excluded.source_id,
                     title = excluded.title,
                     price_text = excluded.price_text,
                     link = excluded.link,
                     attributes_json = excluded.attributes_json,
                     content_hash = excluded.content_hash,
                     stable_id = excluded.stable_id,
                     last_seen_at = excluded.last_seen_at",
            )?;

            for item in items {
                let attributes = serde_json::to_string(&item.attributes)?;
                stmt.execute(params![
                    source_group,
                    item.id,
                    item.source_id,
                    item.title,
                    item.price_text,
                    item.link,
                    attributes,
                    item.content_hash,
                    item.stable_id,
                    item.scraped_at.to_rfc3339(),
                ])?;
            }
        }
        tx.commit()?;
        Ok(items.len())
    }

    async fn record_run(&self, report: &RunReport, snapshot: &Snapshot) -> SinkResult<()> {
        let report_json = serde_json::to_string(report)?;
        let (added, updated, removed, unchanged, completion_rate) = match &report.changes {
            Some(c) => (
                c.added.len() as i64,
                c.updated.len() as i64,
                c.removed.len() as i64,
                c.unchanged as i64,
                c.completion_rate,
            ),
            None => (0, 0, 0, 0, None),
        };

        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO runs (run_id, source_group, config_hash, started_at, finished_at, status,
                 item_count, added, updated, removed, unchanged, completion_rate, report_json)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                report.run_id.to_string(),
                report.source_group,
                report.config_hash,
                report.started_at.to_rfc3339(),
                report.finished_at.to_rfc3339(),
                report.status.to_db_string(),
                snapshot.len() as i64,
                added,
                updated,
                removed,
                unchanged,
                completion_rate,
                report_json,
            ],
        )?;
        let run_row = tx.last_insert_rowid();

        {
            let mut insert_item = tx.prepare(
                "INSERT INTO snapshot_items (run_row, item_id, content_hash, payload)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for item in snapshot.items() {
                let payload = serde_json::to_string(item)?;
                insert_item.execute(params![run_row, item.id, item.content_hash, payload])?;
            }

            if let Some(changes) = &report.changes {
                let mut insert_change = tx.prepare(
                    "INSERT INTO item_changes (run_row, item_id, change, changed_fields)
                     VALUES (?1, ?2, ?3, ?4)",
                )?;
                for item in &changes.added {
                    insert_change.execute(params![run_row, item.id, "added", None::<String>])?;
                }
                for update in &changes.updated {
                    insert_change.execute(params![
                        run_row,
                        update.after.id,
                        "updated",
                        Some(update.changed_fields.join(","))
                    ])?;
                }
                for item in &changes.removed {
                    insert_change.execute(params![run_row, item.id, "removed", None::<String>])?;
                }
            }
        }

        // Keep the current baseline, everything after it and the last few runs
        let pruned = tx.execute(
            "DELETE FROM snapshot_items WHERE run_row IN (
                 SELECT id FROM runs
                 WHERE source_group = ?1
                   AND id < (SELECT COALESCE(MAX(id), 0) FROM runs
                             WHERE source_group = ?1 AND status = ?2)
                   AND id NOT IN (SELECT id FROM runs WHERE source_group = ?1
                                  ORDER BY id DESC LIMIT ?3))",
            params![
                report.source_group,
                RunStatus::Completed.to_db_string(),
                SNAPSHOT_RETENTION
            ],
        )?;

        tx.commit()?;

        tracing::debug!(
            "Recorded run {} ({} snapshot items, {} old snapshot rows pruned)",
            report.run_id,
            snapshot.len(),
            pruned
        );
        Ok(())
    }
}
