use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

/// Main configuration structure for Catalog-Sweep
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub browser: BrowserSettings,
    pub checkpoint: CheckpointConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default, rename = "source")]
    pub sources: Vec<SourceConfig>,
}

impl Config {
    /// Looks up a source by its identifier
    pub fn source(&self, id: &str) -> Option<&SourceConfig> {
        self.sources.iter().find(|s| s.id == id)
    }
}

/// Crawl engine behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Name of the source group; one checkpoint and one baseline exist per group
    #[serde(rename = "source-group")]
    pub source_group: String,

    /// Number of sources crawled concurrently (one browser session each)
    #[serde(rename = "worker-count", default = "default_worker_count")]
    pub worker_count: u32,

    /// Consecutive empty pages that end a paged source
    #[serde(
        rename = "max-consecutive-empty-pages",
        default = "default_max_consecutive_empty_pages"
    )]
    pub max_consecutive_empty_pages: u32,

    /// Unchanged scroll steps that end an infinite-scroll source
    #[serde(
        rename = "stability-threshold",
        default = "default_stability_threshold"
    )]
    pub stability_threshold: u32,

    /// Wait after each scroll before counting items (milliseconds)
    #[serde(rename = "settle-interval-ms", default = "default_settle_interval_ms")]
    pub settle_interval_ms: u64,

    /// Timeout applied to every browser operation (milliseconds)
    #[serde(rename = "step-timeout-ms", default = "default_step_timeout_ms")]
    pub step_timeout_ms: u64,

    /// Retries of the same page/step after a transport error
    #[serde(rename = "max-step-retries", default = "default_max_step_retries")]
    pub max_step_retries: u32,

    /// Completion rate below which a run is reported as degraded
    #[serde(
        rename = "min-completion-rate",
        default = "default_min_completion_rate"
    )]
    pub min_completion_rate: f64,

    /// Pause between two steps of one source (milliseconds)
    #[serde(
        rename = "delay-between-pages-ms",
        default = "default_delay_between_pages_ms"
    )]
    pub delay_between_pages_ms: u64,

    /// Pause before a worker moves on to its next source (milliseconds)
    #[serde(
        rename = "delay-between-sources-ms",
        default = "default_delay_between_sources_ms"
    )]
    pub delay_between_sources_ms: u64,

    /// Base wait before retrying a failed step; doubles with each consecutive failure
    #[serde(rename = "retry-backoff-ms", default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

impl CrawlerConfig {
    pub fn settle_interval(&self) -> Duration {
        Duration::from_millis(self.settle_interval_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_millis(self.step_timeout_ms)
    }

    pub fn delay_between_pages(&self) -> Duration {
        Duration::from_millis(self.delay_between_pages_ms)
    }

    pub fn delay_between_sources(&self) -> Duration {
        Duration::from_millis(self.delay_between_sources_ms)
    }

    /// Wait before retry number `attempt` (1-based) of a failed step
    ///
    /// The wait doubles per attempt and is capped at `MAX_RETRY_BACKOFF`.
    pub fn retry_backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor)).min(MAX_RETRY_BACKOFF)
    }
}

/// Upper bound of the wait between two attempts of one step
const MAX_RETRY_BACKOFF: Duration = Duration::from_secs(60);

/// Headless browser launch and recycling configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BrowserSettings {
    /// Browser operations allowed on one process before it is retired
    #[serde(
        rename = "max-uses-per-session",
        default = "default_max_uses_per_session"
    )]
    pub max_uses_per_session: u32,

    /// Timeout for launching a browser process (milliseconds)
    #[serde(rename = "launch-timeout-ms", default = "default_launch_timeout_ms")]
    pub launch_timeout_ms: u64,

    /// Timeout for the about:blank health probe (milliseconds)
    #[serde(
        rename = "health-check-timeout-ms",
        default = "default_health_check_timeout_ms"
    )]
    pub health_check_timeout_ms: u64,

    /// Pause between tearing down a process and launching its replacement (milliseconds)
    #[serde(
        rename = "recycle-cooldown-ms",
        default = "default_recycle_cooldown_ms"
    )]
    pub recycle_cooldown_ms: u64,

    #[serde(default = "default_true")]
    pub headless: bool,

    /// User agent override applied to every page
    #[serde(rename = "user-agent", default)]
    pub user_agent: Option<String>,

    #[serde(rename = "viewport-width", default = "default_viewport_width")]
    pub viewport_width: u32,

    #[serde(rename = "viewport-height", default = "default_viewport_height")]
    pub viewport_height: u32,

    /// Skip loading images, stylesheets, fonts and media
    #[serde(rename = "block-resources", default = "default_true")]
    pub block_resources: bool,

    /// Path to a Chromium executable; autodetected when absent
    #[serde(default)]
    pub executable: Option<String>,
}

impl BrowserSettings {
    pub fn launch_timeout(&self) -> Duration {
        Duration::from_millis(self.launch_timeout_ms)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_millis(self.health_check_timeout_ms)
    }

    pub fn recycle_cooldown(&self) -> Duration {
        Duration::from_millis(self.recycle_cooldown_ms)
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            max_uses_per_session: default_max_uses_per_session(),
            launch_timeout_ms: default_launch_timeout_ms(),
            health_check_timeout_ms: default_health_check_timeout_ms(),
            recycle_cooldown_ms: default_recycle_cooldown_ms(),
            headless: true,
            user_agent: None,
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            block_resources: true,
            executable: None,
        }
    }
}

/// Checkpoint persistence configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CheckpointConfig {
    /// Path to the checkpoint record (JSON); the item journal lives beside it
    pub path: String,

    /// New items recorded between two checkpoint saves
    #[serde(rename = "interval-items", default = "default_interval_items")]
    pub interval_items: u32,
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path to the SQLite catalog database
    #[serde(rename = "database-path")]
    pub database_path: String,

    /// Directory receiving one JSON report per run
    #[serde(rename = "report-dir")]
    pub report_dir: String,

    /// Path to the markdown summary file
    #[serde(rename = "summary-path")]
    pub summary_path: String,

    /// Items per catalog upsert call
    #[serde(rename = "upsert-batch-size", default = "default_upsert_batch_size")]
    pub upsert_batch_size: u32,
}

/// Content hashing configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Classification attributes that participate in the content hash, in order
    #[serde(rename = "hash-fields", default = "default_hash_fields")]
    pub hash_fields: Vec<String>,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            hash_fields: default_hash_fields(),
        }
    }
}

/// How a listing source is traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TraversalMode {
    Paged,
    InfiniteScroll,
}

/// One crawlable listing endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    /// Unique identifier, also the namespace of this source's item ids
    pub id: String,

    /// Listing address; `{page}` is replaced by the page number in paged mode
    pub url: String,

    pub mode: TraversalMode,

    /// Safety bound: maximum pages (paged) or scroll steps (infinite-scroll)
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    #[serde(rename = "max-consecutive-empty-pages", default)]
    pub max_consecutive_empty_pages: Option<u32>,

    #[serde(rename = "stability-threshold", default)]
    pub stability_threshold: Option<u32>,

    /// Visible text announcing the end of the list
    #[serde(rename = "end-marker-text", default)]
    pub end_marker_text: Option<String>,

    /// CSS selector whose presence announces the end of the list
    #[serde(rename = "end-marker-selector", default)]
    pub end_marker_selector: Option<String>,

    /// Regex applied to the canonical item link; the first capture group is the item key
    #[serde(rename = "id-pattern", default)]
    pub id_pattern: Option<String>,

    pub extract: ExtractRules,

    /// Static attributes attached to every item of this source
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl SourceConfig {
    /// Address of page `page` of a paged source
    pub fn page_url(&self, page: u32) -> String {
        if self.url.contains("{page}") {
            return self.url.replace("{page}", &page.to_string());
        }

        match url::Url::parse(&self.url) {
            Ok(mut url) => {
                url.query_pairs_mut()
                    .append_pair("page", &page.to_string());
                url.to_string()
            }
            Err(_) => self.url.clone(),
        }
    }

    /// Address of the first page, used for infinite-scroll sources
    pub fn listing_url(&self) -> String {
        self.url.replace("{page}", "1")
    }

    pub fn empty_page_limit(&self, defaults: &CrawlerConfig) -> u32 {
        self.max_consecutive_empty_pages
            .unwrap_or(defaults.max_consecutive_empty_pages)
    }

    pub fn stability_limit(&self, defaults: &CrawlerConfig) -> u32 {
        self.stability_threshold
            .unwrap_or(defaults.stability_threshold)
    }
}

/// CSS selectors describing one item card on a listing page
#[derive(Debug, Clone, Deserialize)]
pub struct ExtractRules {
    /// Selector matching one element per item; also counted in infinite-scroll mode
    pub item: String,

    pub title: String,

    #[serde(default)]
    pub price: Option<String>,

    #[serde(default = "default_link_selector")]
    pub link: String,

    /// Extra attribute name -> selector (text of the first match inside the item)
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

fn default_worker_count() -> u32 {
    2
}

fn default_max_consecutive_empty_pages() -> u32 {
    3
}

fn default_stability_threshold() -> u32 {
    3
}

fn default_settle_interval_ms() -> u64 {
    3000
}

fn default_step_timeout_ms() -> u64 {
    30_000
}

fn default_max_step_retries() -> u32 {
    2
}

fn default_delay_between_pages_ms() -> u64 {
    1000
}

fn default_delay_between_sources_ms() -> u64 {
    2000
}

fn default_retry_backoff_ms() -> u64 {
    2000
}

fn default_min_completion_rate() -> f64 {
    0.9
}

fn default_max_uses_per_session() -> u32 {
    40
}

fn default_launch_timeout_ms() -> u64 {
    60_000
}

fn default_health_check_timeout_ms() -> u64 {
    5000
}

fn default_recycle_cooldown_ms() -> u64 {
    3000
}

fn default_viewport_width() -> u32 {
    1366
}

fn default_viewport_height() -> u32 {
    768
}

fn default_true() -> bool {
    true
}

fn default_interval_items() -> u32 {
    10
}

fn default_upsert_batch_size() -> u32 {
    100
}

fn default_hash_fields() -> Vec<String> {
    vec![
        "category".to_string(),
        "condition".to_string(),
        "device".to_string(),
    ]
}

fn default_max_pages() -> u32 {
    50
}

fn default_link_selector() -> String {
    "a".to_string()
}
