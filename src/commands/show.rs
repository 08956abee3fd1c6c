use crate::StatediffContext;
use crate::diff::ChangeKind;
use crate::output;
use crate::session::Session;
use crate::storage::FileRecord;
use crate::utils::{format_mtime, format_size};
use anyhow::{Result, bail};
use colored::Colorize;
use std::path::Path;

/// Print how one path changed between the two phases
///
/// # Errors
///
/// Returns an error if either phase is missing or the path is in neither.
pub fn execute(ctx: &StatediffContext, session: &str, path: &Path) -> Result<()> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let session = Session::open(ctx, session)?;
    let Some(change) = session.file_change(&path)? else {
        bail!("{} is in neither snapshot", path.display());
    };

    println!(
        "{} {} ({})",
        output::change_marker(change.entry.kind),
        path.display().to_string().bold(),
        change.entry.kind.as_str()
    );
    if let Some(before) = &change.entry.before {
        println!("  {} {}", "before:".dimmed(), describe(before));
    }
    if let Some(after) = &change.entry.after {
        println!("  {} {}", "after: ".dimmed(), describe(after));
    }

    match change.text_diff {
        Some(diff) if !diff.is_empty() => {
            println!();
            print!("{}", output::colorize_diff(&diff));
        }
        Some(_) if change.entry.kind == ChangeKind::Modified => {
            output::info("Content unchanged; only metadata differs");
        }
        None if change.entry.kind == ChangeKind::Modified => {
            output::info("No line diff available for this file");
        }
        _ => {}
    }
    Ok(())
}

/// `1.20 KB  2024-05-01 10:00:00  0644  0:0  text  3f2a9c1b`
fn describe(record: &FileRecord) -> String {
    let hash = record.hash.as_field();
    let short = hash.get(..12).unwrap_or(hash);
    format!(
        "{}  {}  {:04o}  {}:{}  {}  {}",
        format_size(record.size),
        format_mtime(record.mtime),
        record.mode & 0o7777,
        record.uid,
        record.gid,
        record.class.as_str(),
        short
    )
}
