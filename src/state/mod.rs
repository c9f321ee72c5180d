//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `SourceState`: Lifecycle of one source during a run (pending, in progress, terminal)
//! - `RunCounters`: Per-run progress and error counters

mod counters;
mod source_state;

// Re-export main types
pub use counters::RunCounters;
pub use source_state::SourceState;
