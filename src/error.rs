//! Error taxonomy for capture and comparison.
//!
//! Per-file conditions ([`SnapshotError::PathUnreadable`] and
//! [`SnapshotError::HashFailed`]) never abort a capture. They are collected as
//! [`ScanWarning`]s and surfaced in the report. Everything else is fatal for
//! the run that raised it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while capturing or comparing snapshots.
#[derive(Debug, Error)]
pub enum SnapshotError {
    /// A path could not be listed or stat'ed (permission denied, vanished).
    #[error("cannot read {path}: {reason}")]
    PathUnreadable {
        /// Offending path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// A file was listed but its content could not be hashed.
    #[error("unreadable during scan: {path}: {reason}")]
    HashFailed {
        /// Offending path
        path: PathBuf,
        /// Underlying cause
        reason: String,
    },

    /// The requested phase has never been captured for this session.
    #[error("no '{phase}' snapshot in {session}. Run 'before' first.")]
    SnapshotMissing {
        /// Missing phase name
        phase: String,
        /// Session directory
        session: PathBuf,
    },

    /// A stored snapshot could not be parsed.
    #[error("corrupt snapshot file {path} at line {line}: {reason}")]
    SnapshotCorrupt {
        /// File that failed to parse
        path: PathBuf,
        /// One-based line number
        line: usize,
        /// What was wrong with it
        reason: String,
    },

    /// git is disabled or missing; text diffs are skipped.
    #[error("version control unavailable: {0}")]
    VersionControlUnavailable(String),

    /// Configuration cannot be used for a scan.
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
}

/// Category of a non-fatal, per-path problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Listing or stat failed; the path is absent from the snapshot
    PathUnreadable,
    /// Content could not be hashed; recorded with a failure marker
    HashFailed,
    /// The same path was recorded twice; the last record was kept
    DuplicatePath,
    /// A configured root was skipped
    RootSkipped,
}

impl WarningKind {
    /// Stable label used in listings and reports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PathUnreadable => "path_unreadable",
            Self::HashFailed => "hash_failed",
            Self::DuplicatePath => "duplicate_path",
            Self::RootSkipped => "root_skipped",
        }
    }
}

/// A per-path problem recorded during a capture.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanWarning {
    /// What went wrong
    pub kind: WarningKind,
    /// Path it went wrong on
    pub path: PathBuf,
    /// Human-readable cause
    pub message: String,
}

impl ScanWarning {
    /// Build a warning from its parts.
    pub fn new(kind: WarningKind, path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ScanWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            WarningKind::HashFailed => write!(
                f,
                "unreadable during scan: {} ({})",
                self.path.display(),
                self.message
            ),
            _ => write!(
                f,
                "{}: {} ({})",
                self.kind.as_str(),
                self.path.display(),
                self.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_failed_display() {
        let warning = ScanWarning::new(WarningKind::HashFailed, "/etc/shadow", "permission denied");
        assert_eq!(
            warning.to_string(),
            "unreadable during scan: /etc/shadow (permission denied)"
        );
    }

    #[test]
    fn test_snapshot_missing_message() {
        let err = SnapshotError::SnapshotMissing {
            phase: "before".to_string(),
            session: PathBuf::from("/var/log/system_changes/upgrade"),
        };
        assert!(err.to_string().contains("Run 'before' first"));
    }
}
