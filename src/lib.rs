//! Catalog-Sweep: an incremental catalog crawl engine
//!
//! This crate crawls paginated and infinite-scroll listing pages of affiliate and
//! cashback catalogs through a pooled headless browser, deduplicates the extracted
//! items into a catalog snapshot, checkpoints progress so a crashed run can resume
//! exactly, and reconciles each snapshot against the previous run's baseline.

pub mod browser;
pub mod catalog;
pub mod checkpoint;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod identity;
pub mod output;
pub mod reconcile;
pub mod sink;
pub mod state;
pub mod traversal;

use thiserror::Error;

/// Main error type for Catalog-Sweep operations
#[derive(Debug, Error)]
pub enum SweepError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Browser error: {0}")]
    Browser(#[from] browser::BrowserError),

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] checkpoint::CheckpointError),

    #[error("Catalog sink error: {0}")]
    Sink(#[from] sink::SinkError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("Invalid state transition for source {source_id}: {from:?} -> {to:?}")]
    InvalidTransition {
        source_id: String,
        from: state::SourceState,
        to: state::SourceState,
    },

    #[error("Unknown source: {0}")]
    UnknownSource(String),

    #[error("Worker task failed: {0}")]
    Worker(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// Result type alias for Catalog-Sweep operations
pub type Result<T> = std::result::Result<T, SweepError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use catalog::{CatalogItem, RawItem, Snapshot};
pub use config::Config;
pub use crawler::CrawlOrchestrator;
pub use reconcile::{reconcile, ChangeSet};
pub use state::SourceState;
