//! Subscriber setup for the binary.
//!
//! Library code only emits `tracing` events. The binary installs one
//! subscriber: human-readable lines on stderr, and optionally the same events
//! without colors appended to `<session>/snapshot.log`.

use anyhow::{Context, Result};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Log file name inside a session directory
pub const LOG_FILE: &str = "snapshot.log";

/// How the subscriber should be built
#[derive(Debug, Clone, Default)]
pub struct LogSettings {
    /// Filter directive used when `RUST_LOG` is unset, e.g. `info`
    pub level: String,
    /// Append events to this file as well
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Settings for a run, with `-v`/`-q` overriding the configured level
    #[must_use]
    pub fn new(configured: &str, verbose: bool, quiet: bool) -> Self {
        let level = if verbose {
            "debug"
        } else if quiet {
            "error"
        } else {
            configured
        };
        Self {
            level: level.to_string(),
            file: None,
        }
    }

    /// Also log to `<session_dir>/snapshot.log`
    #[must_use]
    pub fn with_session_file(mut self, session_dir: &Path) -> Self {
        self.file = Some(session_dir.join(LOG_FILE));
        self
    }

    /// `RUST_LOG` wins over the configured level.
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    }
}

/// Install the global subscriber.
///
/// A second call is a no-op, so tests may call it freely.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened.
pub fn init(settings: &LogSettings) -> Result<()> {
    let file_layer = match &settings.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file: {}", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    let stderr_layer = fmt::layer()
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(settings.filter())
        .with(stderr_layer)
        .with(file_layer)
        .try_init();

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_verbosity_overrides_level() {
        assert_eq!(LogSettings::new("info", true, false).level, "debug");
        assert_eq!(LogSettings::new("info", false, true).level, "error");
        assert_eq!(LogSettings::new("warn", false, false).level, "warn");
    }

    #[test]
    fn test_init_creates_session_log() -> Result<()> {
        let temp = TempDir::new()?;
        let settings = LogSettings::new("info", false, false).with_session_file(temp.path());
        init(&settings)?;
        assert!(temp.path().join(LOG_FILE).exists());
        // Repeated initialization is harmless
        init(&LogSettings::default())?;
        Ok(())
    }
}
