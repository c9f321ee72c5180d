use crate::catalog::CatalogItem;
use crate::checkpoint::{atomic_write, CheckpointError};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Append-only JSON-lines log of the items recorded in a run
///
/// The checkpoint record only lists ids; the journal holds the items
/// themselves so a resumed run can rebuild the same snapshot.
pub struct ItemJournal {
    path: PathBuf,
    writer: Option<BufWriter<File>>,
}

impl ItemJournal {
    pub fn new(path: PathBuf) -> Self {
        Self { path, writer: None }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn append(&mut self, item: &CatalogItem) -> Result<(), CheckpointError> {
        let line = serde_json::to_string(item)?;
        let writer = self.writer()?;
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }

    /// Flushes buffered lines and syncs them to disk
    pub fn sync(&mut self) -> Result<(), CheckpointError> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        Ok(())
    }

    /// Reads every parseable item; a torn trailing line is skipped
    pub fn read_all(&self) -> Result<Vec<CatalogItem>, CheckpointError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut items = Vec::new();
        for (number, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CatalogItem>(&line) {
                Ok(item) => items.push(item),
                Err(e) => {
                    tracing::warn!(
                        "Skipping unreadable journal line {} in {}: {}",
                        number + 1,
                        self.path.display(),
                        e
                    );
                }
            }
        }
        Ok(items)
    }

    /// Replaces the journal content with exactly `items`
    pub fn rewrite<'a, I>(&mut self, items: I) -> Result<(), CheckpointError>
    where
        I: IntoIterator<Item = &'a CatalogItem>,
    {
        self.writer = None;
        let mut buffer = Vec::new();
        for item in items {
            serde_json::to_writer(&mut buffer, item)?;
            buffer.push(b'\n');
        }
        atomic_write(&self.path, &buffer)?;
        Ok(())
    }

    pub fn remove(&mut self) -> Result<(), CheckpointError> {
        self.writer = None;
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn writer(&mut self) -> Result<&mut BufWriter<File>, CheckpointError> {
        if self.writer.is_none() {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            self.writer = Some(BufWriter::new(file));
        }

        match self.writer.as_mut() {
            Some(writer) => Ok(writer),
            None => Err(CheckpointError::Corrupt("journal writer unavailable".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    fn item(id: &str) -> CatalogItem {
        CatalogItem {
            id: id.to_string(),
            stable_id: true,
            content_hash: "h".to_string(),
            source_id: "s".to_string(),
            step: 1,
            position: 0,
            title: id.to_string(),
            price_text: None,
            link: None,
            attributes: BTreeMap::new(),
            scraped_at: Utc::now(),
        }
    }

    #[test]
    fn test_append_and_read() {
        let dir = TempDir::new().unwrap();
        let mut journal = ItemJournal::new(dir.path().join("cp.json.items.jsonl"));

        journal.append(&item("s:1")).unwrap();
        journal.append(&item("s:2")).unwrap();
        journal.sync().unwrap();

        let items = journal.read_all().unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].id, "s:2");
    }

    #[test]
    fn test_torn_line_is_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.jsonl");
        let good = serde_json::to_string(&item("s:1")).unwrap();
        std::fs::write(&path, format!("{}\n{{\"id\":\"s:2\",\"sta", good)).unwrap();

        let items = ItemJournal::new(path).read_all().unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_rewrite_and_remove() {
        let dir = TempDir::new().unwrap();
        let mut journal = ItemJournal::new(dir.path().join("journal.jsonl"));
        journal.append(&item("s:1")).unwrap();
        journal.append(&item("s:2")).unwrap();
        journal.sync().unwrap();

        let keep = item("s:2");
        journal.rewrite([&keep]).unwrap();
        assert_eq!(journal.read_all().unwrap().len(), 1);

        journal.append(&item("s:3")).unwrap();
        journal.sync().unwrap();
        assert_eq!(journal.read_all().unwrap().len(), 2);

        journal.remove().unwrap();
        assert!(!journal.path().exists());
        assert!(journal.read_all().unwrap().is_empty());
    }

    #[test]
    fn test_missing_journal_reads_empty() {
        let journal = ItemJournal::new(PathBuf::from("/nonexistent/journal.jsonl"));
        assert!(journal.read_all().unwrap().is_empty());
    }
}
