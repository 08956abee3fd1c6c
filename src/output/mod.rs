//! Terminal output for the statediff CLI.
//!
//! Status lines go to stderr so stdout carries only command results (diffs,
//! reports, completions). Verbosity is global and set once from `-q`/`-v`.

/// Terminal progress bar.
mod progress;

use crate::diff::ChangeKind;
use colored::{ColoredString, Colorize};
use std::sync::atomic::{AtomicU8, Ordering};

pub use progress::Progress;

/// Verbosity level for output messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    /// Only warnings and errors.
    Quiet = 0,
    /// Default verbosity level.
    Normal = 1,
    /// Also show detail lines.
    Verbose = 2,
}

/// Global verbosity setting (default: Normal).
static VERBOSITY: AtomicU8 = AtomicU8::new(1);

/// Sets the global verbosity level for all output functions.
pub fn set_verbosity(level: Verbosity) {
    VERBOSITY.store(level as u8, Ordering::Relaxed);
}

/// Gets the current global verbosity level.
pub fn get_verbosity() -> Verbosity {
    match VERBOSITY.load(Ordering::Relaxed) {
        0 => Verbosity::Quiet,
        2 => Verbosity::Verbose,
        _ => Verbosity::Normal,
    }
}

/// Prints a success message in green (respects quiet mode).
pub fn success(message: &str) {
    if get_verbosity() == Verbosity::Quiet {
        return;
    }
    eprintln!("{}", message.green());
}

/// Prints a warning message in bold yellow (always shown).
pub fn warning(message: &str) {
    eprintln!("{}", message.yellow().bold());
}

/// Prints an informational message in dimmed color (respects quiet mode).
pub fn info(message: &str) {
    if get_verbosity() == Verbosity::Quiet {
        return;
    }
    eprintln!("{}", message.dimmed());
}

/// Prints a detail line (only in verbose mode).
pub fn verbose(message: &str) {
    if get_verbosity() != Verbosity::Verbose {
        return;
    }
    eprintln!("{}", message.dimmed());
}

/// Prints an action line such as `Capturing before` with a bold verb.
pub fn action(verb: &str, message: &str) {
    if get_verbosity() == Verbosity::Quiet {
        return;
    }
    eprintln!("{} {}", verb.bold(), message);
}

/// A change marker colored by kind: green `+`, red `-`, yellow `~`
#[must_use]
pub fn change_marker(kind: ChangeKind) -> ColoredString {
    let symbol = kind.symbol().to_string();
    match kind {
        ChangeKind::Added => symbol.green().bold(),
        ChangeKind::Removed => symbol.red().bold(),
        ChangeKind::Modified => symbol.yellow().bold(),
        ChangeKind::Unchanged => symbol.normal(),
    }
}

/// Colorize a unified diff for the terminal
#[must_use]
pub fn colorize_diff(diff: &str) -> String {
    let mut out = String::with_capacity(diff.len());
    for line in diff.lines() {
        let styled = if line.starts_with("+++") || line.starts_with("---") {
            line.bold()
        } else if line.starts_with("@@") {
            line.cyan()
        } else if line.starts_with('+') {
            line.green()
        } else if line.starts_with('-') {
            line.red()
        } else if line.starts_with("diff --git") || line.starts_with("index ") {
            line.dimmed()
        } else {
            line.normal()
        };
        out.push_str(&styled.to_string());
        out.push('\n');
    }
    out
}
