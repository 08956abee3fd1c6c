/// `statediff after`
pub mod after;
/// `statediff before`
pub mod before;
/// `statediff config`
pub mod config;
/// `statediff report`
pub mod report;
/// `statediff show`
pub mod show;
/// `statediff status`
pub mod status;

use crate::output;
use crate::report::Report;
use crate::session::CaptureSummary;
use colored::Colorize;

/// Counts from one capture, on stderr
fn print_capture_summary(summary: &CaptureSummary) {
    output::info(&format!(
        "Recorded {} files, {} text snapshots",
        summary.records,
        summary.texts.len()
    ));
    match summary.tracked {
        Some(tracked) => output::verbose(&format!(
            "Tracked text files: {} copied, {} removed, {} skipped",
            tracked.copied, tracked.removed, tracked.skipped
        )),
        None => output::verbose("Text file tracking unavailable"),
    }
    if summary.warnings > 0 {
        output::warning(&format!(
            "{} paths could not be read completely; see the report's warnings",
            summary.warnings
        ));
    }
}

/// One line per section that changed
fn print_report_summary(report: &Report) {
    let mut any = false;
    for section in &report.changes {
        let label = format!("{:<12}", section.name).bold();
        if let Some(reason) = &section.unavailable {
            println!("  {label} {} ({reason})", "unavailable".dimmed());
            continue;
        }
        if !section.has_changes() {
            continue;
        }
        any = true;
        let mut counts = section.summary.as_ref().map_or_else(
            || "changed".to_string(),
            |s| {
                format!(
                    "{} added, {} removed, {} modified",
                    s.added.to_string().green(),
                    s.removed.to_string().red(),
                    s.modified.to_string().yellow()
                )
            },
        );
        if !section.metadata.is_empty() {
            counts = format!("{counts}, {} metadata", section.metadata.len().to_string().cyan());
        }
        println!("  {label} {counts}");
    }
    if !any {
        println!("  No changes detected.");
    }
}
