//! Run reports and summaries
//!
//! This module handles:
//! - The JSON run report written after every run
//! - The markdown summary
//! - Console statistics

mod markdown;
pub(crate) mod report;
pub mod stats;

pub use markdown::{format_markdown_summary, write_markdown_summary};
pub use report::{latest_report, prepare_report_dir, RunReport, RunStatus, SourceReport};
pub use stats::{print_recent_runs, print_report};

use thiserror::Error;

/// Errors that can occur during output operations
#[derive(Debug, Error)]
pub enum OutputError {
    #[error("Failed to write output: {0}")]
    Write(String),

    #[error("Failed to serialize report: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for output operations
pub type OutputResult<T> = Result<T, OutputError>;
