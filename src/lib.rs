#![warn(missing_docs)]
#![warn(clippy::missing_docs_in_private_items)]
// Allow pedantic strict lints that create false positives in this codebase
#![allow(clippy::arithmetic_side_effects)] // Simple counters and size totals cannot overflow
#![allow(clippy::indexing_slicing)] // Bounds checked by logic

//! # statediff - Before/After Host State Snapshots
//!
//! statediff captures the state of a host at two points in time and reports
//! what changed in between: files added, removed or modified, line-level
//! diffs of text files, and changes to packages, services, processes, ports,
//! accounts and cron jobs.
//!
//! ## Architecture
//!
//! - [`scanner`]: exclusion matching and directory traversal
//! - [`collector`]: metadata capture and parallel SHA-256 hashing
//! - [`storage`]: the on-disk snapshot format
//! - [`diff`]: sorted-merge change classification and unified rendering
//! - [`tracker`]: git mirror of text files for line diffs
//! - [`providers`]: text snapshots of external host state
//! - [`report`]: text and JSON reports
//! - [`session`]: the `before` / `after` / `report` workflow
//!
//! ## Example Usage
//!
//! ```no_run
//! use statediff::StatediffContext;
//! use statediff::report::SectionFilter;
//! use statediff::session::Session;
//! use statediff::storage::Phase;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ctx = StatediffContext::load(None)?;
//! let session = Session::open(&ctx, "kernel-upgrade")?;
//!
//! session.capture(Phase::Before)?;
//! // ... apply the change ...
//! session.capture(Phase::After)?;
//!
//! let outcome = session.report(&SectionFilter::All)?;
//! println!("{}", outcome.text_path.display());
//! # Ok(())
//! # }
//! ```

/// Command-line interface definitions (argument parsing structures).
pub mod cli;

/// Command implementations behind the CLI.
pub mod commands;

/// Metadata capture and content hashing.
pub mod collector;

/// Configuration parsing, validation, and management.
pub mod config;

/// Change classification and diff rendering.
pub mod diff;

/// Error taxonomy and scan warnings.
pub mod error;

/// Session locking so captures never overlap.
pub mod lock;

/// Tracing subscriber setup.
pub mod logging;

/// Output formatting and progress display.
pub mod output;

/// Text snapshots of packages, services and other host state.
pub mod providers;

/// Text and JSON change reports.
pub mod report;

/// Filesystem scanning and directory traversal utilities.
pub mod scanner;

/// Capture sessions and the phase workflow.
pub mod session;

/// Snapshot data model and on-disk format.
pub mod storage;

/// Git-backed tracking of text file contents.
pub mod tracker;

/// Hashing and thread pool helpers.
pub mod utils;

use anyhow::Result;
use std::path::{Path, PathBuf};

/// Current version of the statediff binary.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Directory holding one subdirectory per session.
pub const DEFAULT_SNAPSHOT_BASE_DIR: &str = "/var/log/system_changes";

/// Configuration file used when neither `--config` nor the environment names one.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/statediff/config.toml";

/// Environment variable naming the configuration file.
pub const CONFIG_ENV: &str = "STATEDIFF_CONFIG";

/// Configuration shared by every command.
///
/// Loaded once at startup and passed explicitly; nothing reads
/// configuration from anywhere else.
#[derive(Debug, Clone)]
pub struct StatediffContext {
    /// Path the configuration was loaded from (it may not exist).
    pub config_path: PathBuf,

    /// Loaded configuration settings.
    pub config: config::Config,

    /// Keys in the configuration file that nothing reads, e.g. `scan.colour`.
    pub unknown_fields: Vec<String>,
}

impl StatediffContext {
    /// Build a context from an already loaded configuration.
    #[must_use]
    pub const fn new(config_path: PathBuf, config: config::Config) -> Self {
        Self {
            config_path,
            config,
            unknown_fields: Vec::new(),
        }
    }

    /// Load the configuration from `explicit`, else `$STATEDIFF_CONFIG`,
    /// else [`DEFAULT_CONFIG_PATH`]. A missing file yields the defaults.
    ///
    /// Unknown keys do not fail the load; they are kept in
    /// [`Self::unknown_fields`] for [`Self::warn_unknown_fields`] once logging
    /// is set up.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = explicit.map_or_else(
            || {
                std::env::var_os(CONFIG_ENV)
                    .map_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from)
            },
            Path::to_path_buf,
        );

        let config = config::Config::load(&config_path)?;

        let unknown_fields = if config_path.is_file() {
            config::validator::ConfigValidator::new()
                .unknown_fields(&config_path)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        Ok(Self {
            config_path,
            config,
            unknown_fields,
        })
    }

    /// Log one warning per unknown configuration key.
    pub fn warn_unknown_fields(&self) {
        for field in &self.unknown_fields {
            tracing::warn!(
                field = field.as_str(),
                path = %self.config_path.display(),
                "Unknown configuration option"
            );
        }
    }

    /// Directory of the session called `name`
    #[must_use]
    pub fn session_dir(&self, name: &str) -> PathBuf {
        self.config.scan.snapshot_base_dir.join(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_config_uses_defaults() -> Result<()> {
        let temp = TempDir::new()?;
        let ctx = StatediffContext::load(Some(&temp.path().join("absent.toml")))?;
        assert_eq!(ctx.config, config::Config::default());
        assert_eq!(
            ctx.session_dir("s1"),
            PathBuf::from(DEFAULT_SNAPSHOT_BASE_DIR).join("s1")
        );
        Ok(())
    }

    #[test]
    fn test_explicit_config_loaded() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[scan]\nmax_workers = 3\n")?;

        let ctx = StatediffContext::load(Some(&path))?;
        assert_eq!(ctx.config.scan.max_workers, 3);
        assert_eq!(ctx.config_path, path);
        assert!(ctx.unknown_fields.is_empty());
        Ok(())
    }

    #[test]
    fn test_unknown_fields_kept_for_later() -> Result<()> {
        let temp = TempDir::new()?;
        let path = temp.path().join("config.toml");
        std::fs::write(&path, "[scan]\nmax_workers = 3\ncolour = true\n")?;

        let ctx = StatediffContext::load(Some(&path))?;
        assert_eq!(ctx.unknown_fields, vec!["scan.colour".to_string()]);
        Ok(())
    }
}
