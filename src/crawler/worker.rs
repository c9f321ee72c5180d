//! Crawl workers
//!
//! A worker owns one browser session and takes sources from a shared queue
//! until the queue is empty or the run is cancelled. Everything it learns is
//! reported to the orchestrator as `WorkerEvent`s; the orchestrator alone
//! touches the checkpoint.

use crate::browser::{BrowserError, BrowserSessionPool, SessionHandle};
use crate::catalog::{CatalogItem, ContentHasher, RawItem};
use crate::config::{CrawlerConfig, SourceConfig};
use crate::extract::ItemExtractor;
use crate::identity::IdentityResolver;
use crate::state::SourceState;
use crate::traversal::{Cursor, PageTraversal, TraversalLimits, TraversalOutcome};
use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Progress reported by a worker
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    /// The worker began (or resumed) a source
    Started { source_id: String },

    /// One page or scroll step finished
    Step {
        source_id: String,
        cursor: Cursor,
        items: Vec<CatalogItem>,
        pages_visited: u64,
        duplicates: u64,
        extraction_failed: bool,
    },

    /// A step failed with a recoverable browser error
    TransportError {
        source_id: String,
        error: BrowserError,
    },

    /// The source reached a terminal state
    Finished {
        source_id: String,
        state: SourceState,
        outcome: Option<TraversalOutcome>,
        error: Option<String>,
        pages_visited: u64,
    },

    /// The run was cancelled while the source was in progress
    Stopped { source_id: String, pages_visited: u64 },
}

/// One source waiting to be crawled
#[derive(Debug)]
pub(crate) struct SourceJob {
    pub source: Arc<SourceConfig>,
    pub resume: Option<Cursor>,

    /// Ids this source already emitted before a resume
    pub seen: HashSet<String>,
}

/// Everything the workers of one run share
pub(crate) struct WorkerContext {
    pub pool: Arc<BrowserSessionPool>,
    pub extractor: Arc<dyn ItemExtractor>,
    pub resolver: Arc<IdentityResolver>,
    pub hasher: ContentHasher,
    pub crawler: CrawlerConfig,
    pub events: mpsc::Sender<WorkerEvent>,
    pub cancel: CancellationToken,
    pub queue: Mutex<VecDeque<SourceJob>>,
}

impl WorkerContext {
    fn next_job(&self) -> Option<SourceJob> {
        self.queue.lock().ok().and_then(|mut queue| queue.pop_front())
    }

    /// Puts a job back at the front of the queue
    fn requeue(&self, job: SourceJob) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push_front(job);
        }
    }

    /// Sleeps for `delay`, waking early when the run is cancelled
    async fn pause(&self, delay: Duration) {
        if delay.is_zero() {
            return;
        }
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = self.cancel.cancelled() => {}
        }
    }

    async fn send(&self, event: WorkerEvent) {
        if self.events.send(event).await.is_err() {
            tracing::debug!("Orchestrator stopped listening; dropping worker event");
        }
    }
}

/// Runs one worker until the queue is drained or the run is cancelled
///
/// Only fatal browser errors (a process that cannot be launched) are returned;
/// everything else is reported through events.
pub(crate) async fn run_worker(worker_id: usize, ctx: Arc<WorkerContext>) -> Result<(), BrowserError> {
    let mut session: Option<SessionHandle> = None;
    let mut crawled = 0;

    while !ctx.cancel.is_cancelled() {
        let Some(job) = ctx.next_job() else {
            break;
        };

        if crawled > 0 {
            ctx.pause(ctx.crawler.delay_between_sources()).await;
            if ctx.cancel.is_cancelled() {
                ctx.requeue(job);
                break;
            }
        }
        crawled += 1;

        let handle = match session.take() {
            Some(handle) => handle,
            None => ctx.pool.acquire().await?,
        };

        tracing::debug!(
            "Worker {} takes source '{}' on session {}",
            worker_id,
            job.source.id,
            handle.id()
        );
        session = Some(crawl_source(&ctx, job, handle).await?);
    }

    if let Some(handle) = session {
        ctx.pool.release(handle).await;
    }
    tracing::debug!("Worker {} finished", worker_id);
    Ok(())
}

/// Crawls one source to a terminal state and hands the session back
async fn crawl_source(
    ctx: &WorkerContext,
    job: SourceJob,
    mut session: SessionHandle,
) -> Result<SessionHandle, BrowserError> {
    let source_id = job.source.id.clone();
    let limits = TraversalLimits::for_source(&job.source, &ctx.crawler);

    let mut traversal =
        match PageTraversal::new(job.source.clone(), job.resume, ctx.extractor.clone(), limits) {
            Ok(traversal) => traversal,
            Err(e) => {
                tracing::error!("Source '{}' cannot be traversed: {}", source_id, e);
                ctx.send(WorkerEvent::Started {
                    source_id: source_id.clone(),
                })
                .await;
                ctx.send(WorkerEvent::Finished {
                    source_id,
                    state: SourceState::Failed,
                    outcome: None,
                    error: Some(e.to_string()),
                    pages_visited: 0,
                })
                .await;
                return Ok(session);
            }
        };

    tracing::info!("Crawling source '{}' ({:?})", source_id, job.source.mode);
    ctx.send(WorkerEvent::Started {
        source_id: source_id.clone(),
    })
    .await;

    let mut seen = job.seen;
    let mut reported_pages = 0;
    let mut steps = 0u64;

    // Consecutive failures and the step they happened on. A scroll source
    // restarts from step 0 after a failure, so the count only resets once the
    // traversal gets past that step again.
    let mut retries = 0;
    let mut failed_step: Option<u32> = None;

    loop {
        if steps > 0 && retries == 0 && traversal.outcome().is_none() {
            ctx.pause(ctx.crawler.delay_between_pages()).await;
        }

        if ctx.cancel.is_cancelled() {
            tracing::info!("Stopping source '{}' on request", source_id);
            ctx.send(WorkerEvent::Stopped {
                source_id,
                pages_visited: traversal.pages_visited() - reported_pages,
            })
            .await;
            return Ok(session);
        }

        if traversal.allows_session_rotation() {
            session = ctx.pool.recycle_if_needed(session).await?;
        }

        match traversal.next_batch(&mut session).await {
            Ok(Some(batch)) => {
                steps += 1;
                if failed_step.map_or(true, |step| batch.step >= step) {
                    retries = 0;
                    failed_step = None;
                }
                let (items, duplicates) = promote(ctx, &mut seen, batch.items);
                let pages = traversal.pages_visited() - reported_pages;
                reported_pages = traversal.pages_visited();

                ctx.send(WorkerEvent::Step {
                    source_id: source_id.clone(),
                    cursor: batch.cursor_after,
                    items,
                    pages_visited: pages,
                    duplicates,
                    extraction_failed: batch.extraction_failed,
                })
                .await;
            }
            Ok(None) => {
                let outcome = traversal.outcome();
                let state = outcome
                    .map(|o| o.source_state())
                    .unwrap_or(SourceState::Completed);
                tracing::info!(
                    "Source '{}' finished as {} ({:?}) after {} pages",
                    source_id,
                    state,
                    outcome,
                    traversal.pages_visited()
                );
                ctx.send(WorkerEvent::Finished {
                    source_id,
                    state,
                    outcome,
                    error: None,
                    pages_visited: traversal.pages_visited() - reported_pages,
                })
                .await;
                return Ok(session);
            }
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => {
                let step = traversal.next_step();
                failed_step = Some(failed_step.map_or(step, |s| s.max(step)));
                retries += 1;
                let exhausted = retries > ctx.crawler.max_step_retries;

                if exhausted {
                    tracing::error!(
                        "Source '{}' failed after {} attempts: {}",
                        source_id,
                        retries,
                        e
                    );
                } else {
                    tracing::warn!(
                        "Source '{}' step failed (attempt {}/{}): {}; retrying on a fresh session",
                        source_id,
                        retries,
                        ctx.crawler.max_step_retries + 1,
                        e
                    );
                }

                session = ctx.pool.recycle(session).await?;
                ctx.send(WorkerEvent::TransportError {
                    source_id: source_id.clone(),
                    error: e.clone(),
                })
                .await;

                if exhausted {
                    ctx.send(WorkerEvent::Finished {
                        source_id,
                        state: SourceState::Failed,
                        outcome: None,
                        error: Some(e.to_string()),
                        pages_visited: traversal.pages_visited() - reported_pages,
                    })
                    .await;
                    return Ok(session);
                }

                traversal.restart_after_session_loss();
                ctx.pause(ctx.crawler.retry_backoff(retries)).await;
            }
        }
    }
}

/// Resolves ids and hashes, dropping items this source already emitted
fn promote(
    ctx: &WorkerContext,
    seen: &mut HashSet<String>,
    raw_items: Vec<RawItem>,
) -> (Vec<CatalogItem>, u64) {
    let mut items = Vec::with_capacity(raw_items.len());
    let mut duplicates = 0;

    for raw in raw_items {
        let resolved = ctx.resolver.resolve(&raw);
        if !seen.insert(resolved.id.clone()) {
            duplicates += 1;
            continue;
        }
        let hash = ctx
            .hasher
            .hash(&raw.title, raw.price_text.as_deref(), &raw.attributes);
        items.push(CatalogItem::from_raw(raw, resolved.id, resolved.stable, hash));
    }

    (items, duplicates)
}
