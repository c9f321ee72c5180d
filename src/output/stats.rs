//! Run statistics for the console
//!
//! Prints the outcome of a run, or the recent run history stored in the
//! catalog database (`--stats`).

use crate::output::RunReport;
use crate::sink::RunRow;

/// Prints a finished run to stdout
///
/// # Arguments
///
/// * `report` - The run to display
pub fn print_report(report: &RunReport) {
    println!("=== Catalog Sweep Run ===\n");

    println!("Overview:");
    println!("  Run: {}", report.run_id);
    println!("  Source group: {}", report.source_group);
    println!("  Status: {}", report.status);
    println!("  Duration: {}s", report.duration_seconds());
    if report.resumed {
        println!("  Resumed from checkpoint");
    }
    println!();

    println!("Sources:");
    for source in &report.sources {
        match &source.error {
            Some(error) => println!(
                "  {}: {} ({} items) - {}",
                source.source_id, source.state, source.items, error
            ),
            None => println!(
                "  {}: {} ({} items)",
                source.source_id, source.state, source.items
            ),
        }
    }
    println!();

    if let Some(changes) = &report.changes {
        println!("Changes:");
        println!("  Added: {}", changes.added.len());
        println!("  Updated: {}", changes.updated.len());
        println!("  Removed: {}", changes.removed.len());
        println!("  Unchanged: {}", changes.unchanged);
        if changes.untracked > 0 {
            println!("  Untracked (positional ids): {}", changes.untracked);
        }
        if let Some(rate) = changes.completion_rate {
            println!("  Completion rate: {:.1}%", rate * 100.0);
        }
        println!();
    }

    let c = &report.counters;
    println!("Counters:");
    println!("  Pages visited: {}", c.pages_visited);
    println!("  Items processed: {}", c.items_processed);
    println!("  Duplicates dropped: {}", c.duplicates_dropped);
    println!("  Extraction errors: {}", c.extraction_errors);
    println!("  Transport errors: {}", c.transport_errors);
    println!("  Session recycles: {}", c.session_recycles);
    println!("  Sink errors: {}", c.sink_errors);
}

/// Prints the run history to stdout
pub fn print_recent_runs(runs: &[RunRow]) {
    println!("=== Recent Runs ===\n");

    if runs.is_empty() {
        println!("No runs recorded yet.");
        return;
    }

    for run in runs {
        let rate = run
            .completion_rate
            .map(|r| format!("{:.1}%", r * 100.0))
            .unwrap_or_else(|| "n/a".to_string());
        println!(
            "{} [{}] {} items: +{} ~{} -{} ={} (completion {})",
            run.finished_at,
            run.status,
            run.item_count,
            run.added,
            run.updated,
            run.removed,
            run.unchanged,
            rate
        );
        println!("    group {} run {}", run.source_group, run.run_id);
    }
    println!();

    let completed = runs
        .iter()
        .filter(|r| r.status == crate::output::RunStatus::Completed)
        .count();
    println!(
        "Completed: {:.1}% ({} / {} runs)",
        completed as f64 / runs.len() as f64 * 100.0,
        completed,
        runs.len()
    );
}
