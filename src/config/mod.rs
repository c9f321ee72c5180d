//! Configuration module for Catalog-Sweep
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use catalog_sweep::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("sweep.toml")).unwrap();
//! println!("Crawling group: {}", config.crawler.source_group);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    BrowserSettings, CatalogConfig, CheckpointConfig, Config, CrawlerConfig, ExtractRules,
    OutputConfig, SourceConfig, TraversalMode,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, compute_content_hash, load_config, load_config_with_hash, parse_config,
};
