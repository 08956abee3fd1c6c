use crate::StatediffContext;
use crate::session::Session;
use crate::storage::{Phase, PhaseInfo, SnapshotStore};
use crate::tracker::TrackerState;
use anyhow::{Context, Result, bail};
use colored::Colorize;
use std::fs;

/// Show one session's phases, or list every session
///
/// # Errors
///
/// Returns an error if the session does not exist or its headers are corrupt.
pub fn execute(ctx: &StatediffContext, session: Option<&str>) -> Result<()> {
    match session {
        Some(name) => show_session(ctx, name),
        None => list_sessions(ctx),
    }
}

/// Details of one session.
fn show_session(ctx: &StatediffContext, name: &str) -> Result<()> {
    if !ctx.session_dir(name).is_dir() {
        bail!("No session named '{name}'");
    }

    let status = Session::open(ctx, name)?.status()?;
    println!("{} {}", "Session".bold(), status.name);
    println!("  {}", status.dir.display().to_string().dimmed());
    print_phase(Phase::Before, status.before.as_ref());
    print_phase(Phase::After, status.after.as_ref());

    let tracking = match status.tracker {
        TrackerState::Uninitialized => "not started".to_string(),
        TrackerState::Initialized => "no commits".to_string(),
        TrackerState::Committed(phase) => format!("committed through {phase}"),
    };
    println!("  {:<8} {tracking}", "text:");
    println!(
        "  {:<8} {}",
        "report:",
        if status.report_written { "written" } else { "not written" }
    );
    Ok(())
}

fn print_phase(phase: Phase, info: Option<&PhaseInfo>) {
    let label = format!("{phase}:");
    match info {
        Some(info) => println!(
            "  {label:<8} {} {} files, {} warnings, captured {}",
            "✓".green(),
            info.record_count,
            info.warning_count,
            info.captured_at.with_timezone(&chrono::Local).format("%Y-%m-%d %H:%M:%S")
        ),
        None => println!("  {label:<8} {}", "not captured".dimmed()),
    }
}

/// One line per session under the snapshot base directory.
fn list_sessions(ctx: &StatediffContext) -> Result<()> {
    let base = &ctx.config.scan.snapshot_base_dir;
    if !base.is_dir() {
        println!("No sessions in {}", base.display());
        return Ok(());
    }

    let mut names: Vec<String> = fs::read_dir(base)
        .with_context(|| format!("Failed to list {}", base.display()))?
        .filter_map(Result::ok)
        .filter(|entry| entry.path().is_dir())
        .map(|entry| entry.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();

    if names.is_empty() {
        println!("No sessions in {}", base.display());
        return Ok(());
    }

    for name in names {
        let store = SnapshotStore::new(ctx.session_dir(&name));
        let mark = |phase: Phase| {
            if store.exists(phase) {
                phase.to_string().green()
            } else {
                phase.to_string().dimmed()
            }
        };
        println!("{name:<24} {} {}", mark(Phase::Before), mark(Phase::After));
    }
    Ok(())
}
