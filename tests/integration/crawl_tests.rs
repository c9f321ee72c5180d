//! Integration tests for Catalog-Sweep
//!
//! These tests drive the full orchestrator against a scripted browser that
//! serves canned listing pages, so every run is deterministic and offline.

use async_trait::async_trait;
use catalog_sweep::browser::{BrowserError, BrowserLauncher, BrowserProcess};
use catalog_sweep::config::{parse_config, Config};
use catalog_sweep::output::{RunReport, RunStatus};
use catalog_sweep::sink::{CatalogSink, MemorySink, SqliteCatalogSink};
use catalog_sweep::traversal::TraversalOutcome;
use catalog_sweep::{CrawlOrchestrator, SourceState};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

// ===== Scripted browser =====

#[derive(Default)]
struct SiteState {
    pages: HashMap<String, String>,
    feeds: HashMap<String, Vec<String>>,
    failures: HashMap<String, u32>,
    navigations: Vec<String>,
    launches: u32,
    cancel_on: Option<(String, CancellationToken)>,
}

/// A fake website shared by every browser process launched from it
#[derive(Clone, Default)]
struct ScriptedSite {
    state: Arc<Mutex<SiteState>>,
}

impl ScriptedSite {
    fn new() -> Self {
        Self::default()
    }

    fn page(&self, url: &str, html: String) {
        self.state.lock().unwrap().pages.insert(url.to_string(), html);
    }

    /// Registers an infinite-scroll listing; each scroll reveals the next stage
    fn feed(&self, url: &str, stages: Vec<String>) {
        self.state.lock().unwrap().feeds.insert(url.to_string(), stages);
    }

    /// Makes the next `times` navigations to `url` fail with a closed connection
    fn fail(&self, url: &str, times: u32) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert(url.to_string(), times);
    }

    /// Cancels `token` as soon as `url` is navigated to
    fn cancel_when_visiting(&self, url: &str, token: CancellationToken) {
        self.state.lock().unwrap().cancel_on = Some((url.to_string(), token));
    }

    fn visits(&self, url: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .navigations
            .iter()
            .filter(|n| n.as_str() == url)
            .count()
    }

    fn launches(&self) -> u32 {
        self.state.lock().unwrap().launches
    }

    fn launcher(&self) -> Arc<dyn BrowserLauncher> {
        Arc::new(ScriptedLauncher { site: self.clone() })
    }
}

struct ScriptedLauncher {
    site: ScriptedSite,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserProcess>, BrowserError> {
        self.site.state.lock().unwrap().launches += 1;
        Ok(Box::new(ScriptedTab {
            site: self.site.clone(),
            current: String::new(),
            stage: 0,
        }))
    }
}

struct ScriptedTab {
    site: ScriptedSite,
    current: String,
    stage: usize,
}

impl ScriptedTab {
    fn html(&self) -> String {
        let state = self.site.state.lock().unwrap();
        if let Some(stages) = state.feeds.get(&self.current) {
            let idx = self.stage.min(stages.len().saturating_sub(1));
            return stages.get(idx).cloned().unwrap_or_default();
        }
        state.pages.get(&self.current).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl BrowserProcess for ScriptedTab {
    async fn navigate(&mut self, url: &str) -> Result<(), BrowserError> {
        let mut state = self.site.state.lock().unwrap();
        state.navigations.push(url.to_string());

        if let Some((target, token)) = &state.cancel_on {
            if target == url {
                token.cancel();
            }
        }

        if let Some(remaining) = state.failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(BrowserError::ConnectionClosed(format!(
                    "page crashed while loading {}",
                    url
                )));
            }
        }

        self.current = url.to_string();
        self.stage = 0;
        Ok(())
    }

    async fn content(&mut self) -> Result<String, BrowserError> {
        Ok(self.html())
    }

    async fn scroll_to_bottom(&mut self) -> Result<(), BrowserError> {
        self.stage += 1;
        Ok(())
    }

    async fn count_elements(&mut self, selector: &str) -> Result<usize, BrowserError> {
        let selector = scraper::Selector::parse(selector)
            .map_err(|e| BrowserError::Evaluation(format!("{:?}", e)))?;
        let document = scraper::Html::parse_document(&self.html());
        Ok(document.select(&selector).count())
    }

    async fn shutdown(&mut self) {}
}

// ===== Fixtures =====

struct Card {
    key: u32,
    title: &'static str,
    price: &'static str,
    category: &'static str,
}

fn card(key: u32, title: &'static str, price: &'static str) -> Card {
    Card {
        key,
        title,
        price,
        category: "shopping",
    }
}

fn listing_html(cards: &[Card]) -> String {
    let mut html = String::from("<html><body><div class='list'>");
    for c in cards {
        html.push_str(&format!(
            "<div class='box01'><a href='/ad_details/{}?utm_source=list'>\
             <span class='title'>{}</span></a>\
             <span class='price'>{}</span><span class='category'>{}</span></div>",
            c.key, c.title, c.price, c.category
        ));
    }
    html.push_str("</div></body></html>");
    html
}

/// Cards `from..to` with generated titles and prices
fn numbered(from: u32, to: u32) -> String {
    let cards: Vec<Card> = (from..to)
        .map(|i| Card {
            key: i,
            title: "Offer",
            price: "100pt",
            category: "shopping",
        })
        .collect();
    listing_html(&cards)
}

fn empty_page() -> String {
    "<html><body><p class='notice'>Please check back later</p></body></html>".to_string()
}

fn page_url(source: &str, page: u32) -> String {
    format!("https://{}.test/list?page={}", source, page)
}

fn paged_source(id: &str, extra: &str) -> String {
    format!(
        r#"
[[source]]
id = "{id}"
url = "https://{id}.test/list?page={{page}}"
mode = "paged"
id-pattern = 'ad_details/(\d+)'
{extra}

[source.extract]
item = ".box01"
title = ".title"
price = ".price"

[source.extract.attributes]
category = ".category"
"#
    )
}

fn scroll_source(id: &str, extra: &str) -> String {
    format!(
        r#"
[[source]]
id = "{id}"
url = "https://{id}.test/offers"
mode = "infinite-scroll"
id-pattern = 'ad_details/(\d+)'
{extra}

[source.extract]
item = ".box01"
title = ".title"
price = ".price"
"#
    )
}

fn create_test_config(dir: &TempDir, crawler_extra: &str, sources: &[String]) -> Config {
    let root = dir.path().display();
    let toml = format!(
        r#"
[crawler]
source-group = "pointsite"
max-consecutive-empty-pages = 2
stability-threshold = 2
settle-interval-ms = 0
step-timeout-ms = 2000
delay-between-pages-ms = 0
delay-between-sources-ms = 0
retry-backoff-ms = 0
{crawler_extra}

[browser]
recycle-cooldown-ms = 0

[checkpoint]
path = "{root}/state/checkpoint.json"
interval-items = 2

[output]
database-path = "{root}/catalog.db"
report-dir = "{root}/reports"
summary-path = "{root}/summary.md"
{sources}
"#,
        sources = sources.concat()
    );
    parse_config(&toml).unwrap()
}

fn orchestrator(config: Config, site: &ScriptedSite, sink: Arc<dyn CatalogSink>) -> CrawlOrchestrator {
    CrawlOrchestrator::new(config, "config-hash", site.launcher(), sink)
}

fn source_report<'a>(report: &'a RunReport, id: &str) -> &'a catalog_sweep::output::SourceReport {
    report
        .sources
        .iter()
        .find(|s| s.source_id == id)
        .unwrap()
}

fn stored(sink: &MemorySink) -> BTreeMap<String, String> {
    sink.items("pointsite")
        .into_iter()
        .map(|item| (item.id, item.content_hash))
        .collect()
}

// ===== Tests =====

#[tokio::test]
async fn test_full_crawl_paged_and_scroll_sources() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "",
        &[paged_source("alpha", ""), scroll_source("feed", "")],
    );

    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 5));
    site.page(&page_url("alpha", 2), numbered(5, 8));
    site.page(&page_url("alpha", 3), empty_page());
    site.page(&page_url("alpha", 4), empty_page());
    site.feed(
        "https://feed.test/offers",
        vec![numbered(100, 103), numbered(100, 106), numbered(100, 108)],
    );

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert!(!report.resumed);
    assert_eq!(report.snapshot_size, 15);

    let alpha = source_report(&report, "alpha");
    assert_eq!(alpha.state, SourceState::Completed);
    assert_eq!(alpha.outcome, Some(TraversalOutcome::EmptyPageThreshold));
    assert_eq!(alpha.items, 7);

    let feed = source_report(&report, "feed");
    assert_eq!(feed.state, SourceState::Completed);
    assert_eq!(feed.outcome, Some(TraversalOutcome::ScrollStabilized));
    assert_eq!(feed.items, 8);

    let items = stored(&sink);
    assert_eq!(items.len(), 15);
    assert!(items.contains_key("alpha:1"));
    assert!(items.contains_key("feed:107"));

    let changes = report.changes.as_ref().unwrap();
    assert_eq!(changes.added.len(), 15);
    assert_eq!(changes.completion_rate, None);

    assert_eq!(report.counters.transport_errors, 0);
    assert_eq!(report.counters.duplicates_dropped, 0);
    assert!(dir.path().join("summary.md").exists());
    assert_eq!(
        std::fs::read_dir(dir.path().join("reports")).unwrap().count(),
        1
    );
}

#[tokio::test]
async fn test_end_marker_stops_source() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "",
        &[paged_source("alpha", r#"end-marker-text = "No ads found""#)],
    );

    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 4));
    site.page(&page_url("alpha", 2), numbered(4, 6));
    site.page(
        &page_url("alpha", 3),
        "<html><body><p>No ads found</p></body></html>".to_string(),
    );
    site.page(&page_url("alpha", 4), numbered(50, 60));

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    let alpha = source_report(&report, "alpha");
    assert_eq!(alpha.outcome, Some(TraversalOutcome::EndMarker));
    assert_eq!(alpha.items, 5);
    assert_eq!(site.visits(&page_url("alpha", 3)), 1);
    assert_eq!(site.visits(&page_url("alpha", 4)), 0);
    assert_eq!(stored(&sink).len(), 5);
}

#[tokio::test]
async fn test_empty_pages_up_to_threshold_stop_the_source() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "",
        &[paged_source("alpha", "max-consecutive-empty-pages = 3")],
    );

    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 3));
    site.page(&page_url("alpha", 2), numbered(3, 5));
    for page in 3..=5 {
        site.page(&page_url("alpha", page), empty_page());
    }
    site.page(&page_url("alpha", 6), numbered(5, 9));

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink).run().await.unwrap();

    let alpha = source_report(&report, "alpha");
    assert_eq!(alpha.outcome, Some(TraversalOutcome::EmptyPageThreshold));
    assert_eq!(alpha.items, 4);
    assert_eq!(site.visits(&page_url("alpha", 5)), 1);
    assert_eq!(site.visits(&page_url("alpha", 6)), 0);
    assert_eq!(report.counters.pages_visited, 5);
}

#[tokio::test]
async fn test_empty_streak_resets_on_items() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "",
        &[paged_source("alpha", "max-consecutive-empty-pages = 3")],
    );

    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 3));
    site.page(&page_url("alpha", 2), empty_page());
    site.page(&page_url("alpha", 3), empty_page());
    site.page(&page_url("alpha", 4), numbered(3, 6));
    for page in 5..=7 {
        site.page(&page_url("alpha", page), empty_page());
    }

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    let alpha = source_report(&report, "alpha");
    assert_eq!(alpha.outcome, Some(TraversalOutcome::EmptyPageThreshold));
    assert_eq!(alpha.items, 5);
    assert!(stored(&sink).contains_key("alpha:5"));
    assert_eq!(site.visits(&page_url("alpha", 7)), 1);
    assert_eq!(site.visits(&page_url("alpha", 8)), 0);
}

#[tokio::test]
async fn test_transport_error_recovers_on_fresh_session() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "", &[paged_source("alpha", "")]);

    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 4));
    site.page(&page_url("alpha", 2), numbered(4, 7));
    site.fail(&page_url("alpha", 2), 1);

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(source_report(&report, "alpha").state, SourceState::Completed);
    assert_eq!(report.counters.transport_errors, 1);
    assert_eq!(report.counters.session_recycles, 1);
    assert_eq!(site.launches(), 2);
    assert_eq!(site.visits(&page_url("alpha", 2)), 2);
    assert_eq!(stored(&sink).len(), 6);
}

#[tokio::test]
async fn test_permanent_failure_fails_only_that_source() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "max-step-retries = 1",
        &[paged_source("alpha", ""), paged_source("beta", "")],
    );

    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 4));
    site.fail(&page_url("alpha", 1), 100);
    site.page(&page_url("beta", 1), numbered(10, 13));

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    assert_eq!(report.status, RunStatus::Degraded);
    let failed: Vec<&str> = report.failed_sources().map(|s| s.source_id.as_str()).collect();
    assert_eq!(failed, vec!["alpha"]);

    let alpha = source_report(&report, "alpha");
    assert_eq!(alpha.state, SourceState::Failed);
    assert!(alpha.error.is_some());
    assert_eq!(source_report(&report, "beta").state, SourceState::Completed);

    assert_eq!(report.counters.transport_errors, 2);
    assert_eq!(site.visits(&page_url("alpha", 1)), 2);
    assert_eq!(stored(&sink).len(), 3);
}

#[tokio::test]
async fn test_interrupted_run_resumes_to_identical_snapshot() {
    let sources = [paged_source("alpha", ""), paged_source("beta", "")];
    let build_site = || {
        let site = ScriptedSite::new();
        site.page(&page_url("alpha", 1), numbered(1, 4));
        site.page(&page_url("alpha", 2), numbered(4, 7));
        site.page(&page_url("alpha", 3), numbered(7, 9));
        site.page(&page_url("beta", 1), numbered(20, 24));
        site
    };

    // Reference: one uninterrupted run
    let reference_dir = TempDir::new().unwrap();
    let reference_sink = Arc::new(MemorySink::new());
    let reference_site = build_site();
    orchestrator(
        create_test_config(&reference_dir, "worker-count = 1", &sources),
        &reference_site,
        reference_sink.clone(),
    )
    .run()
    .await
    .unwrap();

    // Interrupted while alpha page 2 is being crawled
    let dir = TempDir::new().unwrap();
    let sink = Arc::new(MemorySink::new());
    let site = build_site();
    let first = orchestrator(
        create_test_config(&dir, "worker-count = 1", &sources),
        &site,
        sink.clone(),
    );
    site.cancel_when_visiting(&page_url("alpha", 2), first.cancellation_token());
    let interrupted = first.run().await.unwrap();

    assert_eq!(interrupted.status, RunStatus::Interrupted);
    assert!(interrupted.changes.is_none());
    assert!(sink.runs().is_empty());
    assert!(dir.path().join("state/checkpoint.json").exists());

    // A new process picks the run up where it stopped
    let resumed = orchestrator(
        create_test_config(&dir, "worker-count = 1", &sources),
        &site,
        sink.clone(),
    )
    .run()
    .await
    .unwrap();

    assert!(resumed.resumed);
    assert_eq!(resumed.run_id, interrupted.run_id);
    assert_eq!(resumed.status, RunStatus::Completed);
    assert_eq!(stored(&sink), stored(&reference_sink));
    assert_eq!(stored(&sink).len(), 12);

    // Pages finished before the interruption are never crawled again
    assert_eq!(site.visits(&page_url("alpha", 1)), 1);
    assert_eq!(site.visits(&page_url("alpha", 2)), 1);
    assert_eq!(resumed.counters.duplicates_dropped, 0);
}

#[tokio::test]
async fn test_fresh_run_ignores_checkpoint() {
    let dir = TempDir::new().unwrap();
    let sources = [paged_source("alpha", "")];
    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 4));
    site.page(&page_url("alpha", 2), numbered(4, 6));

    let sink = Arc::new(MemorySink::new());
    let first = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone());
    site.cancel_when_visiting(&page_url("alpha", 2), first.cancellation_token());
    let interrupted = first.run().await.unwrap();
    assert_eq!(interrupted.status, RunStatus::Interrupted);

    let fresh = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .with_resume(false)
        .run()
        .await
        .unwrap();

    assert!(!fresh.resumed);
    assert_ne!(fresh.run_id, interrupted.run_id);
    assert_eq!(site.visits(&page_url("alpha", 1)), 2);
    assert_eq!(stored(&sink).len(), 5);
}

#[tokio::test]
async fn test_reconciliation_across_runs() {
    let dir = TempDir::new().unwrap();
    let sources = [paged_source("alpha", "")];
    let site = ScriptedSite::new();
    site.page(
        &page_url("alpha", 1),
        listing_html(&[
            card(1, "Travel booking", "500pt"),
            card(2, "Credit card", "1,000pt"),
            card(3, "Survey", "10pt"),
        ]),
    );

    let sink = Arc::new(MemorySink::new());
    let first = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(first.changes.unwrap().added.len(), 3);

    site.page(
        &page_url("alpha", 1),
        listing_html(&[
            card(1, "Travel booking", "500pt"),
            card(2, "Credit card", "1,200pt"),
            card(4, "App install", "80pt"),
        ]),
    );

    let second = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(second.status, RunStatus::Completed);
    let changes = second.changes.unwrap();

    let added: Vec<&str> = changes.added.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(added, vec!["alpha:4"]);

    assert_eq!(changes.updated.len(), 1);
    assert_eq!(changes.updated[0].after.id, "alpha:2");
    assert_eq!(changes.updated[0].changed_fields, vec!["price".to_string()]);
    assert_eq!(changes.updated[0].before.price_text.as_deref(), Some("1,000pt"));

    let removed: Vec<&str> = changes.removed.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(removed, vec!["alpha:3"]);

    assert_eq!(changes.unchanged, 1);
    assert_eq!(changes.completion_rate, Some(1.0));
}

#[tokio::test]
async fn test_content_hash_stable_across_runs() {
    let dir = TempDir::new().unwrap();
    let sources = [paged_source("alpha", "")];
    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 6));

    let sink = Arc::new(MemorySink::new());
    orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();
    let first_hashes = stored(&sink);

    let second = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();

    let changes = second.changes.unwrap();
    assert!(!changes.has_changes());
    assert_eq!(changes.unchanged, 5);
    assert_eq!(stored(&sink), first_hashes);
}

#[tokio::test]
async fn test_low_completion_rate_degrades_run() {
    let dir = TempDir::new().unwrap();
    let sources = [paged_source("alpha", "")];
    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 11));

    let sink = Arc::new(MemorySink::new());
    orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();

    site.page(&page_url("alpha", 1), numbered(1, 5));
    let second = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();

    assert_eq!(second.status, RunStatus::Degraded);
    let changes = second.changes.unwrap();
    assert_eq!(changes.removed.len(), 6);
    assert_eq!(changes.completion_rate, Some(0.4));
}

#[tokio::test]
async fn test_safety_limit_on_endless_source() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(&dir, "", &[paged_source("alpha", "max-pages = 2")]);

    let site = ScriptedSite::new();
    for page in 1..=5 {
        site.page(&page_url("alpha", page), numbered(page * 10, page * 10 + 2));
    }

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    let alpha = source_report(&report, "alpha");
    assert_eq!(alpha.state, SourceState::SafetyLimited);
    assert_eq!(alpha.outcome, Some(TraversalOutcome::SafetyLimit));
    let limited: Vec<&str> = report
        .safety_limited_sources()
        .map(|s| s.source_id.as_str())
        .collect();
    assert_eq!(limited, vec!["alpha"]);
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(site.visits(&page_url("alpha", 3)), 0);
    assert_eq!(stored(&sink).len(), 4);
}

#[tokio::test]
async fn test_duplicate_items_across_sources_kept_once() {
    let dir = TempDir::new().unwrap();
    let config = create_test_config(
        &dir,
        "",
        &[paged_source("alpha", ""), paged_source("beta", "")],
    );

    // Beta repeats a card on its second page
    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 3));
    site.page(&page_url("beta", 1), numbered(1, 3));
    site.page(&page_url("beta", 2), numbered(2, 4));

    let sink = Arc::new(MemorySink::new());
    let report = orchestrator(config, &site, sink.clone()).run().await.unwrap();

    // Ids are namespaced per source, so only the repeat within beta is dropped
    assert_eq!(report.snapshot_size, 5);
    assert_eq!(report.counters.duplicates_dropped, 1);
    let items = stored(&sink);
    assert!(items.contains_key("alpha:1"));
    assert!(items.contains_key("beta:1"));
    assert!(items.contains_key("beta:3"));
}

#[tokio::test]
async fn test_sqlite_sink_end_to_end() {
    let dir = TempDir::new().unwrap();
    let sources = [paged_source("alpha", "")];
    let site = ScriptedSite::new();
    site.page(&page_url("alpha", 1), numbered(1, 4));

    let db_path = dir.path().join("catalog.db");
    let sink = Arc::new(SqliteCatalogSink::open(&db_path).unwrap());

    let first = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();
    assert_eq!(first.changes.unwrap().added.len(), 3);

    site.page(&page_url("alpha", 1), numbered(2, 5));
    let second = orchestrator(create_test_config(&dir, "", &sources), &site, sink.clone())
        .run()
        .await
        .unwrap();

    let changes = second.changes.unwrap();
    assert_eq!(changes.added.len(), 1);
    assert_eq!(changes.removed.len(), 1);
    assert_eq!(changes.unchanged, 2);

    let runs = sink.recent_runs(Some("pointsite"), 10).unwrap();
    assert_eq!(runs.len(), 2);
    assert_eq!(runs[0].run_id, second.run_id.to_string());
    assert_eq!(runs[0].added, 1);
    assert_eq!(runs[0].removed, 1);

    // Removed items stay in the catalog; only the snapshot moves on
    assert_eq!(sink.item_count("pointsite").unwrap(), 4);
}
