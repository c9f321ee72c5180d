//! Crawler module
//!
//! This module contains the crawl orchestration:
//! - `CrawlOrchestrator` drives a run from checkpoint to report
//! - workers crawl sources on pooled browser sessions

mod coordinator;
mod worker;

pub use coordinator::CrawlOrchestrator;
