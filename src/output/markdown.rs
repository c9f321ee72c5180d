//! Markdown summary generation
//!
//! Renders a `RunReport` as a human-readable summary: run metadata, per-source
//! outcomes, the change classification and every error counter.

use crate::output::{OutputResult, RunReport};
use crate::reconcile::BaselineStatus;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Maximum number of items listed per change section
const LISTED_CHANGES: usize = 25;

/// Writes the markdown summary of `report` to `output_path`
///
/// # Arguments
///
/// * `report` - The run report to summarize
/// * `output_path` - Path where the markdown file should be written
pub fn write_markdown_summary(report: &RunReport, output_path: &Path) -> OutputResult<()> {
    let markdown = format_markdown_summary(report);

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_summary(report: &RunReport) -> String {
    let mut md = String::new();

    md.push_str("# Catalog Sweep Summary\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Run ID**: {}\n", report.run_id));
    md.push_str(&format!("- **Source Group**: {}\n", report.source_group));
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    md.push_str(&format!("- **Finished**: {}\n", report.finished_at.to_rfc3339()));
    let duration = report.duration_seconds();
    md.push_str(&format!(
        "- **Duration**: {} seconds ({:.2} minutes)\n",
        duration,
        duration as f64 / 60.0
    ));
    md.push_str(&format!("- **Status**: {}\n", report.status));
    md.push_str(&format!("- **Resumed**: {}\n", report.resumed));
    md.push_str(&format!("- **Config Hash**: {}\n\n", report.config_hash));

    // Sources
    md.push_str("## Sources\n\n");
    md.push_str("| Source | State | Outcome | Items | Error |\n");
    md.push_str("|--------|-------|---------|-------|-------|\n");
    for source in &report.sources {
        let outcome = source
            .outcome
            .map(|o| format!("{:?}", o))
            .unwrap_or_else(|| "-".to_string());
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            source.source_id,
            source.state,
            outcome,
            source.items,
            source.error.as_deref().unwrap_or("-")
        ));
    }
    md.push('\n');

    // Changes
    md.push_str("## Changes\n\n");
    md.push_str(&format!("- **Snapshot Size**: {}\n", report.snapshot_size));
    match &report.changes {
        Some(changes) => {
            match &changes.baseline_status {
                BaselineStatus::Available => {}
                BaselineStatus::Missing => {
                    md.push_str("- **Baseline**: missing, every item is classified as added\n")
                }
                BaselineStatus::Corrupt(detail) => md.push_str(&format!(
                    "- **Baseline**: corrupt ({}), every item is classified as added\n",
                    detail
                )),
            }
            md.push_str(&format!("- **Added**: {}\n", changes.added.len()));
            md.push_str(&format!("- **Updated**: {}\n", changes.updated.len()));
            md.push_str(&format!("- **Removed**: {}\n", changes.removed.len()));
            md.push_str(&format!("- **Unchanged**: {}\n", changes.unchanged));
            md.push_str(&format!("- **Untracked**: {}\n", changes.untracked));
            match changes.completion_rate {
                Some(rate) => md.push_str(&format!(
                    "- **Completion Rate**: {:.2}%\n",
                    rate * 100.0
                )),
                None => md.push_str("- **Completion Rate**: n/a\n"),
            }
            if let Some(rate) = changes.efficiency_rate() {
                md.push_str(&format!("- **Skipped As Unchanged**: {:.2}%\n", rate * 100.0));
            }
            md.push('\n');

            if !changes.added.is_empty() {
                md.push_str("### Added\n\n");
                for item in changes.added.iter().take(LISTED_CHANGES) {
                    md.push_str(&format!("- `{}` {}\n", item.id, item.title));
                }
                push_overflow(&mut md, changes.added.len());
            }

            if !changes.updated.is_empty() {
                md.push_str("### Updated\n\n");
                md.push_str("| Item | Changed Fields |\n");
                md.push_str("|------|----------------|\n");
                for update in changes.updated.iter().take(LISTED_CHANGES) {
                    md.push_str(&format!(
                        "| `{}` | {} |\n",
                        update.after.id,
                        update.changed_fields.join(", ")
                    ));
                }
                push_overflow(&mut md, changes.updated.len());
            }

            if !changes.removed.is_empty() {
                md.push_str("### Removed\n\n");
                for item in changes.removed.iter().take(LISTED_CHANGES) {
                    md.push_str(&format!("- `{}` {}\n", item.id, item.title));
                }
                push_overflow(&mut md, changes.removed.len());
            }
        }
        None => md.push_str("- Not reconciled in this run\n\n"),
    }

    // Counters
    let c = &report.counters;
    md.push_str("## Error Summary\n\n");
    md.push_str("| Counter | Count |\n");
    md.push_str("|---------|-------|\n");
    md.push_str(&format!("| Pages Visited | {} |\n", c.pages_visited));
    md.push_str(&format!("| Items Processed | {} |\n", c.items_processed));
    md.push_str(&format!("| Duplicates Dropped | {} |\n", c.duplicates_dropped));
    md.push_str(&format!("| Extraction Errors | {} |\n", c.extraction_errors));
    md.push_str(&format!("| Transport Errors | {} |\n", c.transport_errors));
    md.push_str(&format!("| Session Recycles | {} |\n", c.session_recycles));
    md.push_str(&format!("| Sink Errors | {} |\n\n", c.sink_errors));

    let p = &report.pool;
    md.push_str("## Browser Pool\n\n");
    md.push_str(&format!("- **Launched**: {}\n", p.launched));
    md.push_str(&format!("- **Reused**: {}\n", p.reused));
    md.push_str(&format!("- **Retired By Budget**: {}\n", p.retired_by_budget));
    md.push_str(&format!(
        "- **Recycled After Error**: {}\n",
        p.recycled_after_error
    ));
    md.push_str(&format!("- **Health Failures**: {}\n", p.health_failures));

    md
}

fn push_overflow(md: &mut String, total: usize) {
    if total > LISTED_CHANGES {
        md.push_str(&format!("\n... and {} more\n\n", total - LISTED_CHANGES));
    } else {
        md.push('\n');
    }
}
