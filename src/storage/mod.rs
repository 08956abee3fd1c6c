/// Snapshot persistence: sorted listings, atomic replacement
pub mod snapshots;

use crate::error::{ScanWarning, WarningKind};
use crate::scanner::EntryKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

pub use snapshots::{PhaseInfo, SnapshotStore};

/// Marker written instead of a digest for files above the hash size limit
pub const TOO_LARGE_MARKER: &str = "TOO_LARGE";
/// Marker written when reading a file for hashing failed
pub const HASH_FAILED_MARKER: &str = "HASH_FAILED";
/// Marker written for entries that are never hashed (symlink leaves)
pub const SKIPPED_MARKER: &str = "SKIPPED";

/// Capture phase of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Baseline captured before the change
    Before,
    /// Capture taken after the change
    After,
}

impl Phase {
    /// Lowercase name used in file names, commit messages and tags
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Before => "before",
            Self::After => "after",
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Phase {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "before" => Ok(Self::Before),
            "after" => Ok(Self::After),
            other => Err(anyhow::anyhow!("Unknown phase: {other}")),
        }
    }
}

/// Outcome of the hashing step for one file
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashState {
    /// Hex SHA-256 of the content
    Digest(String),
    /// Above the configured hash size limit
    TooLarge,
    /// Content could not be read
    Failed,
    /// Not eligible for hashing (symlink leaf)
    Skipped,
}

impl HashState {
    /// The digest, if one was computed
    #[must_use]
    pub fn digest(&self) -> Option<&str> {
        match self {
            Self::Digest(d) => Some(d),
            _ => None,
        }
    }

    /// Field value written to the hash listing
    #[must_use]
    pub fn as_field(&self) -> &str {
        match self {
            Self::Digest(d) => d,
            Self::TooLarge => TOO_LARGE_MARKER,
            Self::Failed => HASH_FAILED_MARKER,
            Self::Skipped => SKIPPED_MARKER,
        }
    }

    /// Parse a hash listing field
    #[must_use]
    pub fn parse(field: &str) -> Option<Self> {
        match field {
            TOO_LARGE_MARKER => Some(Self::TooLarge),
            HASH_FAILED_MARKER => Some(Self::Failed),
            SKIPPED_MARKER => Some(Self::Skipped),
            d if crate::utils::hash::is_digest(d) => Some(Self::Digest(d.to_ascii_lowercase())),
            _ => None,
        }
    }
}

/// Name-based text/binary classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileClass {
    /// Mirrored into the git tree for line-level diffs
    Text,
    /// Compared by metadata and digest only
    Binary,
}

impl FileClass {
    /// Label used in snapshot listings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Binary => "binary",
        }
    }

    /// Parse a listing label
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "text" => Some(Self::Text),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// One file's metadata plus its hash state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time, seconds since the Unix epoch
    pub mtime: i64,
    /// Permission and file type bits
    pub mode: u32,
    /// Owner user id
    pub uid: u32,
    /// Owner group id
    pub gid: u32,
    /// Regular file or symlink leaf
    pub kind: EntryKind,
    /// Text or binary, by name
    pub class: FileClass,
    /// Digest or the reason there is none
    pub hash: HashState,
}

impl FileRecord {
    /// Whether the git tracker should mirror this file
    #[must_use]
    pub fn is_text(&self) -> bool {
        self.class == FileClass::Text && self.kind == EntryKind::File
    }
}

/// One phase's complete captured state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Which phase this is
    pub phase: Phase,
    /// When the capture started
    pub captured_at: DateTime<Utc>,
    /// Roots that were scanned
    pub roots: Vec<PathBuf>,
    /// Exclusion patterns in effect
    pub excludes: Vec<String>,
    /// Records sorted by path, paths unique
    pub records: Vec<FileRecord>,
    /// Per-path problems met during capture
    pub warnings: Vec<ScanWarning>,
}

/// Sort records by path and drop duplicates, keeping the last record for a
/// path. Each dropped duplicate produces a warning.
#[must_use]
pub fn normalize_records(mut records: Vec<FileRecord>) -> (Vec<FileRecord>, Vec<ScanWarning>) {
    // Stable sort keeps input order among equal paths, so the last one wins
    records.sort_by(|a, b| a.path.cmp(&b.path));

    let mut warnings = Vec::new();
    let mut unique: Vec<FileRecord> = Vec::with_capacity(records.len());

    for record in records {
        if let Some(last) = unique.last_mut()
            && last.path == record.path
        {
            tracing::warn!(path = %record.path.display(), "Duplicate path in snapshot, keeping last record");
            warnings.push(ScanWarning::new(
                WarningKind::DuplicatePath,
                record.path.clone(),
                "path recorded more than once; last record kept",
            ));
            *last = record;
            continue;
        }
        unique.push(record);
    }

    (unique, warnings)
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn test_phase_round_trip() -> anyhow::Result<()> {
        assert_eq!("before".parse::<Phase>()?, Phase::Before);
        assert_eq!(Phase::After.to_string(), "after");
        assert!("during".parse::<Phase>().is_err());
        Ok(())
    }

    #[test]
    fn test_hash_state_fields() {
        assert_eq!(HashState::parse("TOO_LARGE"), Some(HashState::TooLarge));
        assert_eq!(HashState::parse("HASH_FAILED"), Some(HashState::Failed));
        assert_eq!(HashState::parse("SKIPPED"), Some(HashState::Skipped));
        assert_eq!(HashState::parse("nonsense"), None);
        assert_eq!(HashState::TooLarge.digest(), None);
    }

    #[test]
    fn test_normalize_sorts_and_keeps_last_duplicate() {
        let records = vec![
            record("/b", 1, 1, "b"),
            record("/a", 1, 1, "first"),
            record("/a", 2, 2, "second"),
        ];

        let (records, warnings) = normalize_records(records);

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].path, PathBuf::from("/a"));
        assert_eq!(records[0].size, 2);
        assert_eq!(records[1].path, PathBuf::from("/b"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].kind, WarningKind::DuplicatePath);
    }

    #[test]
    fn test_symlink_never_text() {
        let mut rec = record("/etc/alternatives/editor", 10, 1, "x");
        rec.kind = EntryKind::Symlink;
        assert!(!rec.is_text());
    }
}
