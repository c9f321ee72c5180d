//! Catalog-Sweep main entry point
//!
//! This is the command-line interface for the Catalog-Sweep crawl engine.

use anyhow::{Context, Result};
use catalog_sweep::browser::ChromiumLauncher;
use catalog_sweep::config::{load_config_with_hash, Config};
use catalog_sweep::output::{
    latest_report, print_recent_runs, print_report, write_markdown_summary, RunReport,
};
use catalog_sweep::sink::{CatalogSink, MemorySink, SqliteCatalogSink};
use catalog_sweep::CrawlOrchestrator;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

/// Catalog-Sweep: an incremental catalog crawler
///
/// Catalog-Sweep crawls paginated and infinite-scroll catalog listings with a
/// headless browser, checkpoints its progress and reports which items were
/// added, updated or removed since the previous run.
#[derive(Parser, Debug)]
#[command(name = "catalog-sweep")]
#[command(version = "1.0.0")]
#[command(about = "An incremental catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Resume an interrupted crawl (default behavior)
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Start a fresh crawl, discarding any checkpoint
    #[arg(long, conflicts_with = "resume")]
    fresh: bool,

    /// Crawl and reconcile without writing to the database or the checkpoint
    #[arg(long, conflicts_with_all = ["stats", "export_summary"])]
    dry_run: bool,

    /// Show the run history from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "export_summary"])]
    stats: bool,

    /// Write the markdown summary of the latest report and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats"])]
    export_summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.stats {
        handle_stats(&config)
    } else if cli.export_summary {
        handle_export_summary(&config)
    } else if cli.dry_run {
        handle_dry_run(config, config_hash).await
    } else {
        handle_crawl(config, config_hash, cli.fresh).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_sweep=info,warn"),
            1 => EnvFilter::new("catalog_sweep=debug,info"),
            2 => EnvFilter::new("catalog_sweep=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --stats mode: shows the run history of this source group
fn handle_stats(config: &Config) -> Result<()> {
    let db_path = Path::new(&config.output.database_path);
    println!("Database: {}\n", db_path.display());

    let sink = SqliteCatalogSink::open(db_path)?;
    let group = &config.crawler.source_group;
    let runs = sink.recent_runs(Some(group), 20)?;
    print_recent_runs(&runs);

    println!(
        "Items in catalog for '{}': {}",
        group,
        sink.item_count(group)?
    );
    Ok(())
}

/// Handles the --export-summary mode: renders the latest report as markdown
fn handle_export_summary(config: &Config) -> Result<()> {
    let report_dir = Path::new(&config.output.report_dir);
    let summary_path = Path::new(&config.output.summary_path);

    println!("=== Exporting Run Summary ===\n");
    println!("Reports: {}", report_dir.display());
    println!("Output: {}", summary_path.display());
    println!();

    let report = latest_report(report_dir, &config.crawler.source_group)?.with_context(|| {
        format!(
            "no run report for source group '{}' in {}",
            config.crawler.source_group,
            report_dir.display()
        )
    })?;

    write_markdown_summary(&report, summary_path)?;
    println!("✓ Summary of run {} exported to: {}", report.run_id, summary_path.display());
    Ok(())
}

/// Handles the --dry-run mode
///
/// Reconciles against the stored baseline but keeps everything else in memory:
/// the checkpoint lives in a temporary directory and nothing is written to the
/// database or the report directory.
async fn handle_dry_run(mut config: Config, config_hash: String) -> Result<()> {
    println!("=== Catalog-Sweep Dry Run ===\n");

    let group = config.crawler.source_group.clone();
    let db_path = Path::new(&config.output.database_path);
    let sink = if db_path.exists() {
        let stored = SqliteCatalogSink::open(db_path)?;
        match stored.load_baseline(&group).await {
            Ok(Some(baseline)) => MemorySink::with_baseline(&group, baseline),
            Ok(None) => MemorySink::new(),
            Err(e) => {
                tracing::warn!("Ignoring unusable baseline: {}", e);
                MemorySink::new()
            }
        }
    } else {
        MemorySink::new()
    };

    let scratch = tempfile::tempdir().context("failed to create a scratch directory")?;
    config.checkpoint.path = scratch
        .path()
        .join("checkpoint.json")
        .to_string_lossy()
        .into_owned();

    let report = run(config, config_hash, Arc::new(sink), false, false).await?;
    print_report(&report);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, config_hash: String, fresh: bool) -> Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (discarding any checkpoint)");
    } else {
        tracing::info!("Starting crawl (will resume if a checkpoint exists)");
    }
    tracing::info!(
        "Source group '{}': {} sources, {} workers",
        config.crawler.source_group,
        config.sources.len(),
        config.crawler.worker_count
    );

    let sink = SqliteCatalogSink::open(Path::new(&config.output.database_path))?;
    let report = run(config, config_hash, Arc::new(sink), !fresh, true).await?;
    print_report(&report);
    Ok(())
}

async fn run(
    config: Config,
    config_hash: String,
    sink: Arc<dyn CatalogSink>,
    resume: bool,
    write_outputs: bool,
) -> Result<RunReport> {
    let launcher = Arc::new(
        ChromiumLauncher::new(config.browser.clone())
            .with_request_timeout(config.crawler.step_timeout()),
    );
    let orchestrator = CrawlOrchestrator::new(config, config_hash, launcher, sink)
        .with_resume(resume)
        .with_outputs(write_outputs);

    let token = orchestrator.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received; finishing the current step and saving progress");
            token.cancel();
        }
    });

    match orchestrator.run().await {
        Ok(report) => {
            tracing::info!("Crawl finished with status {}", report.status);
            Ok(report)
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
