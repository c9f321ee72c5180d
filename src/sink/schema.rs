//! Database schema for the catalog sink
//!
//! The sink keeps the latest view of every item, one row per run, the full
//! snapshot of recent runs (the reconciliation baseline) and the classified
//! changes of each run.

/// SQL schema for the catalog database
pub const SCHEMA_SQL: &str = r#"
-- One row per recorded crawl run
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id TEXT NOT NULL UNIQUE,
    source_group TEXT NOT NULL,
    config_hash TEXT NOT NULL,
    started_at TEXT NOT NULL,
    finished_at TEXT NOT NULL,
    status TEXT NOT NULL,
    item_count INTEGER NOT NULL,
    added INTEGER NOT NULL DEFAULT 0,
    updated INTEGER NOT NULL DEFAULT 0,
    removed INTEGER NOT NULL DEFAULT 0,
    unchanged INTEGER NOT NULL DEFAULT 0,
    completion_rate REAL,
    report_json TEXT NOT NULL
);

-- Latest known state of every item
CREATE TABLE IF NOT EXISTS catalog_items (
    source_group TEXT NOT NULL,
    item_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    title TEXT NOT NULL,
    price_text TEXT,
    link TEXT,
    attributes_json TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    stable_id INTEGER NOT NULL,
    first_seen_at TEXT NOT NULL,
    last_seen_at TEXT NOT NULL,
    PRIMARY KEY (source_group, item_id)
);

-- Full snapshot of a run, used as the next run's baseline
CREATE TABLE IF NOT EXISTS snapshot_items (
    run_row INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    item_id TEXT NOT NULL,
    content_hash TEXT NOT NULL,
    payload TEXT NOT NULL,
    PRIMARY KEY (run_row, item_id)
);

-- Classified changes per run
CREATE TABLE IF NOT EXISTS item_changes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_row INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
    item_id TEXT NOT NULL,
    change TEXT NOT NULL,
    changed_fields TEXT
);

CREATE INDEX IF NOT EXISTS idx_runs_group_status ON runs(source_group, status);
CREATE INDEX IF NOT EXISTS idx_catalog_items_source ON catalog_items(source_id);
CREATE INDEX IF NOT EXISTS idx_item_changes_run ON item_changes(run_row);
"#;

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}

/// Gets the current schema version
pub fn get_schema_version() -> u32 {
    1
}
