//! Crawl orchestration
//!
//! `CrawlOrchestrator` runs one crawl of a source group end to end:
//! - opens (or resumes) the checkpoint
//! - runs the sources on a bounded pool of workers
//! - records every finished step in the checkpoint
//! - merges, reconciles against the sink's baseline and publishes the result

use crate::browser::{BrowserLauncher, BrowserSessionPool, PoolStats};
use crate::catalog::{ContentHasher, Snapshot};
use crate::checkpoint::CrawlCheckpoint;
use crate::config::Config;
use crate::crawler::worker::{run_worker, SourceJob, WorkerContext, WorkerEvent};
use crate::extract::{ItemExtractor, SelectorExtractor};
use crate::identity::IdentityResolver;
use crate::output::{
    prepare_report_dir, write_markdown_summary, RunReport, RunStatus, SourceReport,
};
use crate::reconcile::{Baseline, ChangeSet, DifferentialReconciler};
use crate::sink::CatalogSink;
use crate::state::SourceState;
use crate::{Result, SweepError};
use chrono::Utc;
use std::collections::{HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Pages between two progress log lines
const PROGRESS_INTERVAL: u64 = 10;

/// Capacity of the worker event channel
const EVENT_BUFFER: usize = 256;

/// Runs crawls of one configured source group
pub struct CrawlOrchestrator {
    config: Arc<Config>,
    config_hash: String,
    launcher: Arc<dyn BrowserLauncher>,
    extractor: Arc<dyn ItemExtractor>,
    sink: Arc<dyn CatalogSink>,
    cancel: CancellationToken,
    resume: bool,
    write_outputs: bool,
}

impl CrawlOrchestrator {
    /// Creates an orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - Validated configuration
    /// * `config_hash` - Hash of the configuration file, stored in checkpoints
    /// * `launcher` - Starts browser processes for the session pool
    /// * `sink` - Supplies the baseline and receives the snapshot
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        launcher: Arc<dyn BrowserLauncher>,
        sink: Arc<dyn CatalogSink>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            launcher,
            extractor: Arc::new(SelectorExtractor::new()),
            sink,
            cancel: CancellationToken::new(),
            resume: true,
            write_outputs: true,
        }
    }

    /// Replaces the default CSS selector extractor
    pub fn with_extractor(mut self, extractor: Arc<dyn ItemExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    /// Whether a matching checkpoint is continued (the default) or discarded
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    /// Whether the JSON report and markdown summary are written to disk
    pub fn with_outputs(mut self, write_outputs: bool) -> Self {
        self.write_outputs = write_outputs;
        self
    }

    /// Token that stops the run cooperatively when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs the crawl to completion, interruption or a fatal error
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - The run finished or was interrupted; see `status`
    /// * `Err(SweepError)` - A fatal error stopped the run; the checkpoint was saved
    pub async fn run(&self) -> Result<RunReport> {
        let config = &self.config;
        let group = config.crawler.source_group.as_str();
        let source_ids: Vec<String> = config.sources.iter().map(|s| s.id.clone()).collect();

        let mut checkpoint = CrawlCheckpoint::open(
            Path::new(&config.checkpoint.path),
            config.checkpoint.interval_items,
            group,
            &self.config_hash,
            &config.sources,
            self.resume,
        )?;

        let run_id = checkpoint.record().run_id;
        if checkpoint.is_resumed() {
            tracing::info!(
                "Resuming run {} with {} items already recorded",
                run_id,
                checkpoint.record().emitted_ids.len()
            );
        } else {
            tracing::info!("Starting run {} for source group '{}'", run_id, group);
        }

        let hasher = ContentHasher::new(config.catalog.hash_fields.clone());
        let resolver = Arc::new(IdentityResolver::new(&config.sources)?);

        let jobs: VecDeque<SourceJob> = config
            .sources
            .iter()
            .filter_map(|source| {
                let progress = checkpoint.source_progress(&source.id)?;
                if progress.state.is_terminal() {
                    tracing::debug!("Source '{}' already {}", source.id, progress.state);
                    return None;
                }
                let seen: HashSet<String> = checkpoint
                    .items_for(&source.id)
                    .iter()
                    .map(|item| item.id.clone())
                    .collect();
                Some(SourceJob {
                    source: Arc::new(source.clone()),
                    resume: progress.cursor,
                    seen,
                })
            })
            .collect();

        let worker_count = (config.crawler.worker_count as usize).min(jobs.len());
        let pool = Arc::new(BrowserSessionPool::new(
            self.launcher.clone(),
            config.browser.clone(),
            worker_count.max(1),
            config.crawler.step_timeout(),
        ));

        let fatal = self
            .drive_workers(&mut checkpoint, pool.clone(), jobs, worker_count, resolver, hasher.clone())
            .await;

        pool.shutdown().await;
        checkpoint.save()?;
        let pool_stats = pool.stats();

        if let Some(error) = fatal {
            tracing::error!("Run {} aborted: {}", run_id, error);
            return Err(error);
        }

        if self.cancel.is_cancelled() && !checkpoint.record().all_terminal() {
            tracing::warn!(
                "Run {} interrupted; progress saved to {}",
                run_id,
                config.checkpoint.path
            );
            let report = self.build_report(&checkpoint, RunStatus::Interrupted, 0, None, pool_stats);
            self.write_outputs(&report)?;
            return Ok(report);
        }

        // Merge in configuration order; the first occurrence of an id wins
        let (snapshot, dropped) = Snapshot::merge(checkpoint.item_lists(&source_ids));
        checkpoint.counters_mut().duplicates_dropped += dropped;
        tracing::info!(
            "Merged snapshot holds {} items ({} duplicates dropped)",
            snapshot.len(),
            checkpoint.counters().duplicates_dropped
        );

        let baseline = self.load_baseline(group).await;
        let changes = DifferentialReconciler::new(hasher).reconcile(&baseline, &snapshot);
        let status = self.classify_run(&checkpoint, &changes);

        tracing::info!(
            "Changes: {} added, {} updated, {} removed, {} unchanged",
            changes.added.len(),
            changes.updated.len(),
            changes.removed.len(),
            changes.unchanged
        );

        self.upsert_snapshot(&mut checkpoint, group, &snapshot).await;

        let mut report = self.build_report(
            &checkpoint,
            status,
            snapshot.len(),
            Some(changes),
            pool_stats,
        );
        if let Err(e) = self.sink.record_run(&report, &snapshot).await {
            tracing::error!("Failed to record run {} in the catalog sink: {}", run_id, e);
            report.counters.sink_errors += 1;
        }

        self.write_outputs(&report)?;
        checkpoint.rotate()?;

        tracing::info!(
            "Run {} finished as {} in {}s",
            run_id,
            report.status,
            report.duration_seconds()
        );
        Ok(report)
    }

    /// Runs the workers and applies their events until all of them stopped
    ///
    /// Returns the first fatal error, after cancelling the remaining workers.
    async fn drive_workers(
        &self,
        checkpoint: &mut CrawlCheckpoint,
        pool: Arc<BrowserSessionPool>,
        jobs: VecDeque<SourceJob>,
        worker_count: usize,
        resolver: Arc<IdentityResolver>,
        hasher: ContentHasher,
    ) -> Option<SweepError> {
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let ctx = Arc::new(WorkerContext {
            pool,
            extractor: self.extractor.clone(),
            resolver,
            hasher,
            crawler: self.config.crawler.clone(),
            events: tx,
            cancel: self.cancel.clone(),
            queue: Mutex::new(jobs),
        });

        let mut workers = JoinSet::new();
        for worker_id in 0..worker_count {
            workers.spawn(run_worker(worker_id, ctx.clone()));
        }
        // The channel closes once every worker dropped its context
        drop(ctx);

        let started = Instant::now();
        let mut fatal: Option<SweepError> = None;

        loop {
            tokio::select! {
                Some(event) = rx.recv() => {
                    if let Err(e) = self.apply_event(checkpoint, event, started) {
                        tracing::error!("Failed to record crawl progress: {}", e);
                        self.cancel.cancel();
                        fatal.get_or_insert(e);
                    }
                }
                Some(joined) = workers.join_next() => {
                    let error = match joined {
                        Ok(Ok(())) => None,
                        Ok(Err(e)) => Some(SweepError::Browser(e)),
                        Err(e) => Some(SweepError::Worker(e.to_string())),
                    };
                    if let Some(error) = error {
                        tracing::error!("Worker stopped with a fatal error: {}", error);
                        self.cancel.cancel();
                        fatal.get_or_insert(error);
                    }
                }
                else => break,
            }
        }

        fatal
    }

    fn apply_event(
        &self,
        checkpoint: &mut CrawlCheckpoint,
        event: WorkerEvent,
        started: Instant,
    ) -> Result<()> {
        match event {
            WorkerEvent::Started { source_id } => {
                let pending = checkpoint
                    .source_progress(&source_id)
                    .map(|p| p.state == SourceState::Pending)
                    .ok_or_else(|| SweepError::UnknownSource(source_id.clone()))?;
                if pending {
                    checkpoint.set_source_state(&source_id, SourceState::InProgress, None, None)?;
                }
            }
            WorkerEvent::Step {
                source_id,
                cursor,
                items,
                pages_visited,
                duplicates,
                extraction_failed,
            } => {
                {
                    let counters = checkpoint.counters_mut();
                    counters.pages_visited += pages_visited;
                    counters.duplicates_dropped += duplicates;
                    if extraction_failed {
                        counters.extraction_errors += 1;
                    }
                }
                checkpoint.record_page(&source_id, cursor, items)?;

                let pages = checkpoint.counters().pages_visited;
                if pages_visited > 0 && pages % PROGRESS_INTERVAL == 0 {
                    let rate = pages as f64 / started.elapsed().as_secs_f64().max(0.001);
                    tracing::info!(
                        "Progress: {} pages visited, {} items recorded, {:.2} pages/sec",
                        pages,
                        checkpoint.counters().items_processed,
                        rate
                    );
                }

                if checkpoint.should_save() {
                    checkpoint.save()?;
                }
            }
            WorkerEvent::TransportError { source_id, error } => {
                tracing::debug!("Source '{}' transport error: {}", source_id, error);
                let counters = checkpoint.counters_mut();
                counters.transport_errors += 1;
                counters.session_recycles += 1;
            }
            WorkerEvent::Finished {
                source_id,
                state,
                outcome,
                error,
                pages_visited,
            } => {
                checkpoint.counters_mut().pages_visited += pages_visited;
                checkpoint.set_source_state(&source_id, state, outcome, error)?;
            }
            WorkerEvent::Stopped {
                source_id,
                pages_visited,
            } => {
                tracing::debug!("Source '{}' stopped before finishing", source_id);
                checkpoint.counters_mut().pages_visited += pages_visited;
            }
        }
        Ok(())
    }

    async fn load_baseline(&self, group: &str) -> Baseline {
        match self.sink.load_baseline(group).await {
            Ok(Some(snapshot)) => {
                tracing::info!("Loaded baseline with {} items", snapshot.len());
                Baseline::Available(snapshot)
            }
            Ok(None) => {
                tracing::error!(
                    "No baseline for source group '{}'; every item is classified as added",
                    group
                );
                Baseline::Missing
            }
            Err(e) => {
                tracing::error!(
                    "Baseline for source group '{}' is unusable ({}); every item is classified as added",
                    group,
                    e
                );
                Baseline::Corrupt(e.to_string())
            }
        }
    }

    fn classify_run(&self, checkpoint: &CrawlCheckpoint, changes: &ChangeSet) -> RunStatus {
        let min_rate = self.config.crawler.min_completion_rate;
        let mut status = RunStatus::Completed;

        let failed = checkpoint
            .record()
            .sources
            .values()
            .filter(|p| p.state == SourceState::Failed)
            .count();
        if failed > 0 {
            tracing::error!("{} source(s) failed in this run", failed);
            status = RunStatus::Degraded;
        }

        if !changes.coverage_ok(min_rate) {
            tracing::error!(
                "Completion rate {:.1}% is below the minimum of {:.1}%; the crawl may be incomplete",
                changes.completion_rate.unwrap_or(0.0) * 100.0,
                min_rate * 100.0
            );
            status = RunStatus::Degraded;
        }

        status
    }

    /// Writes the snapshot to the sink in batches; failed batches are counted
    async fn upsert_snapshot(
        &self,
        checkpoint: &mut CrawlCheckpoint,
        group: &str,
        snapshot: &Snapshot,
    ) {
        let batch_size = self.config.output.upsert_batch_size.max(1) as usize;
        let items: Vec<_> = snapshot.items().cloned().collect();
        let mut written = 0;

        for batch in items.chunks(batch_size) {
            match self.sink.upsert(group, batch).await {
                Ok(count) => written += count,
                Err(e) => {
                    tracing::warn!("Failed to upsert {} items: {}", batch.len(), e);
                    checkpoint.counters_mut().sink_errors += batch.len() as u64;
                }
            }
        }

        tracing::info!("Upserted {} of {} items", written, items.len());
    }

    fn build_report(
        &self,
        checkpoint: &CrawlCheckpoint,
        status: RunStatus,
        snapshot_size: usize,
        changes: Option<ChangeSet>,
        pool: PoolStats,
    ) -> RunReport {
        let record = checkpoint.record();
        let sources = self
            .config
            .sources
            .iter()
            .filter_map(|source| {
                let progress = record.sources.get(&source.id)?;
                Some(SourceReport {
                    source_id: source.id.clone(),
                    state: progress.state,
                    outcome: progress.outcome,
                    items: progress.items_emitted,
                    error: progress.error.clone(),
                })
            })
            .collect();

        RunReport {
            run_id: record.run_id,
            source_group: record.source_group.clone(),
            config_hash: record.config_hash.clone(),
            started_at: record.started_at,
            finished_at: Utc::now(),
            status,
            resumed: checkpoint.is_resumed(),
            sources,
            snapshot_size,
            changes,
            counters: record.counters.clone(),
            pool,
        }
    }

    fn write_outputs(&self, report: &RunReport) -> Result<()> {
        if !self.write_outputs {
            return Ok(());
        }

        let report_dir = Path::new(&self.config.output.report_dir);
        prepare_report_dir(report_dir)?;
        let path = report.write_to_dir(report_dir)?;
        tracing::info!("Run report written to {}", path.display());

        let summary_path = Path::new(&self.config.output.summary_path);
        write_markdown_summary(report, summary_path)?;
        tracing::info!("Summary written to {}", summary_path.display());
        Ok(())
    }
}
