//! Crawl checkpointing
//!
//! A run's progress lives in two files next to each other:
//!
//! - `<path>`: the JSON checkpoint record (source states, cursors, emitted ids,
//!   counters), replaced atomically on every save
//! - `<path>.items.jsonl`: the append-only item journal
//!
//! After a finished run the record is archived as `<path>.prev`.

mod journal;
mod record;
mod store;

use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use thiserror::Error;

pub use journal::ItemJournal;
pub use record::{CheckpointRecord, SourceProgress, CHECKPOINT_VERSION};
pub use store::CrawlCheckpoint;

/// Checkpoint persistence errors
#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("checkpoint serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("corrupt checkpoint: {0}")]
    Corrupt(String),
}

/// Writes `contents` to a temporary file beside `path`, syncs it and renames
/// it over `path`
pub(crate) fn atomic_write(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)?;

    let mut temp = NamedTempFile::new_in(dir)?;
    temp.write_all(contents)?;
    temp.flush()?;
    temp.as_file_mut().sync_all()?;
    temp.into_temp_path().persist(path).map_err(|e| e.error)
}
