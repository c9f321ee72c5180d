use serde::{Deserialize, Serialize};

/// Per-run error and progress counters
///
/// Owned by the orchestrator for one run and persisted in the checkpoint, so a
/// resumed run continues counting where the interrupted one stopped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounters {
    /// Listing pages or scroll steps visited
    pub pages_visited: u64,

    /// Catalog items accepted into the snapshot
    pub items_processed: u64,

    /// Items dropped because their id was already emitted
    pub duplicates_dropped: u64,

    /// Pages whose extraction failed and were treated as empty
    pub extraction_errors: u64,

    /// Browser timeouts, closed connections and protocol errors
    pub transport_errors: u64,

    /// Browser processes torn down and relaunched after an error
    pub session_recycles: u64,

    /// Items the catalog sink failed to store
    pub sink_errors: u64,
}

impl RunCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the counts of another counter set into this one
    pub fn absorb(&mut self, other: &RunCounters) {
        self.pages_visited += other.pages_visited;
        self.items_processed += other.items_processed;
        self.duplicates_dropped += other.duplicates_dropped;
        self.extraction_errors += other.extraction_errors;
        self.transport_errors += other.transport_errors;
        self.session_recycles += other.session_recycles;
        self.sink_errors += other.sink_errors;
    }

    /// Total number of error events of every class
    pub fn total_errors(&self) -> u64 {
        self.extraction_errors + self.transport_errors + self.sink_errors
    }
}
