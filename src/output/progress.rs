//! In-place progress line for hashing.

use colored::Colorize;
use std::io::{self, IsTerminal, Write};
use std::time::{Duration, Instant};

/// A progress line that redraws in place when stderr is a terminal.
///
/// Renders as `Hashing files: 42% (420/1000)` and finishes with
/// `Hashing files: 100% (1000/1000), done in 1s 200ms.`
pub struct Progress {
    /// Title displayed before the counts
    title: String,
    /// Total number of items
    total: usize,
    /// Items processed so far
    current: usize,
    /// Whether stderr is a TTY (enables inline updating)
    is_tty: bool,
    /// Last displayed percentage (to avoid redundant updates)
    last_percent: u8,
    /// Set once a line has been drawn and not yet terminated
    open_line: bool,
    started_at: Instant,
}

impl Progress {
    /// Creates a progress line; silent unless stderr is a terminal.
    #[must_use]
    pub fn new(title: &str, total: usize) -> Self {
        let mut progress = Self {
            title: title.to_string(),
            total,
            current: 0,
            is_tty: io::stderr().is_terminal(),
            last_percent: 0,
            open_line: false,
            started_at: Instant::now(),
        };
        progress.display();
        progress
    }

    /// Moves to `current`, redrawing only when the percentage changes.
    pub fn update(&mut self, current: usize) {
        self.current = current.min(self.total);
        let percent = self.percent();
        if percent != self.last_percent {
            self.last_percent = percent;
            self.display();
        }
    }

    /// Prints the final line with the elapsed time.
    pub fn finish(mut self) {
        self.current = self.total;
        self.last_percent = 100;

        if self.is_tty && self.open_line {
            let elapsed = Duration::from_millis(
                u64::try_from(self.started_at.elapsed().as_millis()).unwrap_or(u64::MAX),
            );
            eprintln!(
                "\r{}: 100% ({}/{}), done in {}.",
                self.title.dimmed(),
                self.total,
                self.total,
                humantime::format_duration(elapsed)
            );
            self.open_line = false;
        }
    }

    #[allow(
        clippy::cast_precision_loss,
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss
    )]
    fn percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.current as f64 / self.total as f64) * 100.0) as u8
    }

    /// Redraws the bar in place on stderr.
    fn display(&mut self) {
        if !self.is_tty || self.total == 0 {
            return;
        }

        eprint!(
            "\r{}: {}% ({}/{})",
            self.title.dimmed(),
            self.percent().to_string().dimmed(),
            self.current,
            self.total
        );
        let _ = io::stderr().flush();
        self.open_line = true;
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        if self.open_line {
            eprintln!();
        }
    }
}
