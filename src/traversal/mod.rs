//! Listing traversal
//!
//! `PageTraversal` walks one source as a lazy sequence of item batches, one per
//! listing page (paged mode) or scroll step (infinite-scroll mode). Each call to
//! `next_batch` performs exactly one step; a browser error leaves the cursor
//! where it was so the caller can retry the same step on a fresh session.
//!
//! # Termination
//!
//! Paged mode stops on the first of:
//! 1. an explicit end-of-list marker
//! 2. `max-consecutive-empty-pages` pages in a row without items
//! 3. the page safety bound (reported as `SafetyLimit`)
//!
//! Infinite-scroll mode stops once the item count has not grown for
//! `stability-threshold` scrolls, on an end marker, or at the scroll safety bound.

mod paged;
mod scroll;
mod signal;

use crate::browser::{BrowserError, SessionHandle};
use crate::catalog::RawItem;
use crate::config::{CrawlerConfig, SourceConfig, TraversalMode};
use crate::extract::ItemExtractor;
use crate::state::SourceState;
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

pub use signal::{signal_for, AnyOf, EndOfListSignal, NeverEnds, SelectorMarker, TextMarker};

/// Position reached within a source, persisted in the checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cursor {
    /// Next page to render and the current run of empty pages
    Page { next: u32, empty_streak: u32 },

    /// Next scroll step; informational only, scroll sources restart from 0
    Scroll { next: u32 },
}

/// Why a traversal stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TraversalOutcome {
    EndMarker,
    EmptyPageThreshold,
    ScrollStabilized,
    SafetyLimit,
}

impl TraversalOutcome {
    /// Terminal source state this outcome maps to
    pub fn source_state(&self) -> SourceState {
        match self {
            Self::SafetyLimit => SourceState::SafetyLimited,
            _ => SourceState::Completed,
        }
    }
}

/// Items produced by one step
#[derive(Debug, Clone)]
pub struct StepBatch {
    /// Page number or scroll step
    pub step: u32,
    pub items: Vec<RawItem>,
    pub cursor_after: Cursor,

    /// The extractor failed and the step was treated as empty
    pub extraction_failed: bool,
}

/// Termination thresholds resolved for one source
#[derive(Debug, Clone, Copy)]
pub struct TraversalLimits {
    pub max_consecutive_empty_pages: u32,
    pub stability_threshold: u32,
    pub settle_interval: Duration,
}

impl TraversalLimits {
    pub fn for_source(source: &SourceConfig, crawler: &CrawlerConfig) -> Self {
        Self {
            max_consecutive_empty_pages: source.empty_page_limit(crawler),
            stability_threshold: source.stability_limit(crawler),
            settle_interval: crawler.settle_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Progress {
    Paged {
        next_page: u32,
        empty_streak: u32,
    },
    Scroll {
        next_step: u32,
        stability: u32,
        seen: usize,
    },
}

impl Progress {
    fn start(mode: TraversalMode, resume: Option<Cursor>) -> Self {
        match (mode, resume) {
            (TraversalMode::Paged, Some(Cursor::Page { next, empty_streak })) => Self::Paged {
                next_page: next.max(1),
                empty_streak,
            },
            (TraversalMode::Paged, _) => Self::Paged {
                next_page: 1,
                empty_streak: 0,
            },
            (TraversalMode::InfiniteScroll, _) => Self::Scroll {
                next_step: 0,
                stability: 0,
                seen: 0,
            },
        }
    }
}

/// Pull-based traversal of one source
pub struct PageTraversal {
    source: Arc<SourceConfig>,
    extractor: Arc<dyn ItemExtractor>,
    signal: Box<dyn EndOfListSignal>,
    limits: TraversalLimits,
    progress: Progress,
    outcome: Option<TraversalOutcome>,
    pages_visited: u64,
    extraction_errors: u64,
}

impl PageTraversal {
    /// Creates a traversal for `source`
    ///
    /// # Arguments
    ///
    /// * `source` - Source to walk
    /// * `resume` - Cursor from a checkpoint; ignored for infinite-scroll sources
    /// * `extractor` - Turns rendered pages into items
    /// * `limits` - Termination thresholds for this source
    pub fn new(
        source: Arc<SourceConfig>,
        resume: Option<Cursor>,
        extractor: Arc<dyn ItemExtractor>,
        limits: TraversalLimits,
    ) -> Result<Self, ConfigError> {
        let signal = signal_for(&source)?;
        let progress = Progress::start(source.mode, resume);
        Ok(Self {
            source,
            extractor,
            signal,
            limits,
            progress,
            outcome: None,
            pages_visited: 0,
            extraction_errors: 0,
        })
    }

    /// Performs one step and returns its items, or None once the source is done
    pub async fn next_batch(
        &mut self,
        session: &mut SessionHandle,
    ) -> Result<Option<StepBatch>, BrowserError> {
        if self.outcome.is_some() {
            return Ok(None);
        }

        match self.progress {
            Progress::Paged { .. } => self.next_page(session).await,
            Progress::Scroll { .. } => self.next_scroll(session).await,
        }
    }

    /// Prepares the traversal to continue on a fresh session
    ///
    /// Paged sources retry the page that failed. Infinite-scroll sources have
    /// lost their DOM and start over from step 0.
    pub fn restart_after_session_loss(&mut self) {
        if let Progress::Scroll { .. } = self.progress {
            self.progress = Progress::Scroll {
                next_step: 0,
                stability: 0,
                seen: 0,
            };
        }
    }

    /// True when replacing the session now would not lose traversal state
    pub fn allows_session_rotation(&self) -> bool {
        match self.progress {
            Progress::Paged { .. } => true,
            Progress::Scroll { next_step, .. } => next_step == 0,
        }
    }

    /// Page number or scroll step the next call to `next_batch` works on
    pub fn next_step(&self) -> u32 {
        match self.progress {
            Progress::Paged { next_page, .. } => next_page,
            Progress::Scroll { next_step, .. } => next_step,
        }
    }

    pub fn outcome(&self) -> Option<TraversalOutcome> {
        self.outcome
    }

    pub fn source(&self) -> &SourceConfig {
        &self.source
    }

    pub fn pages_visited(&self) -> u64 {
        self.pages_visited
    }

    pub fn extraction_errors(&self) -> u64 {
        self.extraction_errors
    }

    fn extract(&mut self, page: &crate::browser::RenderedPage, step: u32) -> (Vec<RawItem>, bool) {
        match self.extractor.extract(page, &self.source, step) {
            Ok(items) => (items, false),
            Err(e) => {
                tracing::warn!(
                    "Extraction failed for source '{}' step {}: {}",
                    self.source.id,
                    step,
                    e
                );
                self.extraction_errors += 1;
                (Vec::new(), true)
            }
        }
    }
}
