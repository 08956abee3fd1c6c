//! Change classification between two captures.
//!
//! Everything here works on already-sorted sequences with a single forward
//! pass:
//! - [`merge_sorted`] is the generic two-pointer merge
//! - [`diff_snapshots`] classifies file records by path
//! - [`metadata_changes`] lists mode and owner changes of paths in both
//! - [`diff_lines`] treats provider output as a multiset of lines
//! - [`unified`] renders line-level unified diffs with `similar`

/// Unified diff rendering for text content
pub mod unified;

pub use unified::{UnifiedDiffConfig, render_unified};

use crate::storage::{FileRecord, Snapshot};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Classification of one key across two captures
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// Only in the later capture
    Added,
    /// Only in the earlier capture
    Removed,
    /// In both, content differs
    Modified,
    /// In both, same content
    Unchanged,
}

impl ChangeKind {
    /// Lowercase name used in JSON and listings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Removed => "removed",
            Self::Modified => "modified",
            Self::Unchanged => "unchanged",
        }
    }

    /// Marker used in change listings
    #[must_use]
    pub const fn symbol(self) -> char {
        match self {
            Self::Added => '+',
            Self::Removed => '-',
            Self::Modified => '~',
            Self::Unchanged => ' ',
        }
    }
}

/// One key present in either or both sequences.
///
/// `before` is `None` exactly when the kind is `Added`, `after` is `None`
/// exactly when it is `Removed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffEntry<R> {
    /// Classification of the key
    pub kind: ChangeKind,
    /// Value in the earlier sequence
    pub before: Option<R>,
    /// Value in the later sequence
    pub after: Option<R>,
}

impl<R> DiffEntry<R> {
    /// The newest side available
    ///
    /// # Panics
    ///
    /// Never for entries built by [`merge_sorted`], which always fill at
    /// least one side.
    #[must_use]
    pub fn current(&self) -> &R {
        match (&self.after, &self.before) {
            (Some(r), _) | (None, Some(r)) => r,
            (None, None) => unreachable!("diff entry without either side"),
        }
    }

    /// Whether this entry is anything but unchanged
    #[must_use]
    pub fn is_change(&self) -> bool {
        self.kind != ChangeKind::Unchanged
    }

    /// Transform both sides
    pub fn map<T>(self, mut f: impl FnMut(R) -> T) -> DiffEntry<T> {
        DiffEntry {
            kind: self.kind,
            before: self.before.map(&mut f),
            after: self.after.map(&mut f),
        }
    }
}

impl DiffEntry<&FileRecord> {
    /// Path of the record on either side
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.current().path
    }
}

/// Merge two sequences sorted by `key`.
///
/// Keys present only in `after` are added, only in `before` removed. Keys in
/// both are unchanged when `same` holds and modified otherwise. Equal keys on
/// both sides pair up one-to-one, so repeated keys behave as a multiset.
pub fn merge_sorted<'a, T, K, F, S>(
    before: &'a [T],
    after: &'a [T],
    key: F,
    same: S,
) -> Vec<DiffEntry<&'a T>>
where
    K: Ord,
    F: Fn(&'a T) -> K,
    S: Fn(&T, &T) -> bool,
{
    debug_assert!(before.windows(2).all(|w| key(&w[0]) <= key(&w[1])));
    debug_assert!(after.windows(2).all(|w| key(&w[0]) <= key(&w[1])));

    let mut entries = Vec::with_capacity(before.len().max(after.len()));
    let (mut i, mut j) = (0, 0);

    while i < before.len() && j < after.len() {
        let (b, a) = (&before[i], &after[j]);
        match key(b).cmp(&key(a)) {
            Ordering::Less => {
                entries.push(removed(b));
                i += 1;
            }
            Ordering::Greater => {
                entries.push(added(a));
                j += 1;
            }
            Ordering::Equal => {
                let kind = if same(b, a) {
                    ChangeKind::Unchanged
                } else {
                    ChangeKind::Modified
                };
                entries.push(DiffEntry {
                    kind,
                    before: Some(b),
                    after: Some(a),
                });
                i += 1;
                j += 1;
            }
        }
    }

    entries.extend(before[i..].iter().map(removed));
    entries.extend(after[j..].iter().map(added));
    entries
}

const fn added<T>(record: &T) -> DiffEntry<&T> {
    DiffEntry {
        kind: ChangeKind::Added,
        before: None,
        after: Some(record),
    }
}

const fn removed<T>(record: &T) -> DiffEntry<&T> {
    DiffEntry {
        kind: ChangeKind::Removed,
        before: Some(record),
        after: None,
    }
}

/// Whether two records for the same path describe the same content.
///
/// A digest on both sides decides alone. Without one, any size or mtime
/// difference counts as a modification.
#[must_use]
pub fn same_content(before: &FileRecord, after: &FileRecord) -> bool {
    match (before.hash.digest(), after.hash.digest()) {
        (Some(b), Some(a)) => b == a,
        _ => before.size == after.size && before.mtime == after.mtime,
    }
}

/// Classify every path of two snapshots.
#[must_use]
pub fn diff_snapshots<'a>(before: &'a Snapshot, after: &'a Snapshot) -> Vec<DiffEntry<&'a FileRecord>> {
    let entries = merge_sorted(
        &before.records,
        &after.records,
        |r| r.path.as_path(),
        same_content,
    );
    debug!(
        before = before.records.len(),
        after = after.records.len(),
        changes = entries.iter().filter(|e| e.is_change()).count(),
        "Snapshots compared"
    );
    entries
}

/// Compare two text blobs as sorted multisets of lines.
///
/// Line order is ignored; a line repeated more often after than before shows
/// up as added once per extra occurrence.
#[must_use]
pub fn diff_lines<'a>(before: &'a str, after: &'a str) -> Vec<DiffEntry<&'a str>> {
    let mut before_lines: Vec<&str> = before.lines().collect();
    let mut after_lines: Vec<&str> = after.lines().collect();
    before_lines.sort_unstable();
    after_lines.sort_unstable();

    let entries = merge_sorted(&before_lines, &after_lines, |line| *line, |_, _| true)
        .into_iter()
        .map(|entry| entry.map(|line| *line))
        .collect();
    entries
}

/// One line per changed path, prefixed with `+`, `-` or `~`.
#[must_use]
pub fn render_fs_diff(entries: &[DiffEntry<&FileRecord>]) -> String {
    let mut out = String::new();
    for entry in entries.iter().filter(|e| e.is_change()) {
        let _ = writeln!(out, "{} {}", entry.kind.symbol(), entry.path().display());
    }
    out
}

/// Ownership or permission change of a path present in both captures
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataChange {
    /// Affected path
    pub path: PathBuf,
    /// One `field old -> new` description per changed field
    pub changes: Vec<String>,
}

/// Paths in both captures whose permission bits, owner or group changed.
///
/// Content classification is unaffected: a `chmod` alone leaves the entry
/// unchanged but still appears here.
#[must_use]
pub fn metadata_changes(entries: &[DiffEntry<&FileRecord>]) -> Vec<MetadataChange> {
    entries
        .iter()
        .filter_map(|entry| {
            let (Some(before), Some(after)) = (entry.before, entry.after) else {
                return None;
            };

            let mut changes = Vec::new();
            let (old_mode, new_mode) = (before.mode & 0o7777, after.mode & 0o7777);
            if old_mode != new_mode {
                changes.push(format!("mode {old_mode:04o} -> {new_mode:04o}"));
            }
            if before.uid != after.uid {
                changes.push(format!("uid {} -> {}", before.uid, after.uid));
            }
            if before.gid != after.gid {
                changes.push(format!("gid {} -> {}", before.gid, after.gid));
            }

            (!changes.is_empty()).then(|| MetadataChange {
                path: after.path.clone(),
                changes,
            })
        })
        .collect()
}

/// Counts per change kind with a few example keys each
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DiffSummary {
    /// Keys only in the later capture
    pub added: usize,
    /// Keys only in the earlier capture
    pub removed: usize,
    /// Keys in both with different content
    pub modified: usize,
    /// Keys in both with the same content
    pub unchanged: usize,
    /// First added keys
    pub added_examples: Vec<String>,
    /// First removed keys
    pub removed_examples: Vec<String>,
    /// First modified keys
    pub modified_examples: Vec<String>,
}

impl DiffSummary {
    /// Summarize `entries`, keeping at most `max_examples` labels per kind.
    pub fn from_entries<R>(
        entries: &[DiffEntry<R>],
        max_examples: usize,
        label: impl Fn(&R) -> String,
    ) -> Self {
        let mut summary = Self::default();

        for entry in entries {
            let (count, examples) = match entry.kind {
                ChangeKind::Added => (&mut summary.added, &mut summary.added_examples),
                ChangeKind::Removed => (&mut summary.removed, &mut summary.removed_examples),
                ChangeKind::Modified => (&mut summary.modified, &mut summary.modified_examples),
                ChangeKind::Unchanged => {
                    summary.unchanged += 1;
                    continue;
                }
            };
            *count += 1;
            if examples.len() < max_examples {
                examples.push(label(entry.current()));
            }
        }

        summary
    }

    /// Added plus removed plus modified
    #[must_use]
    pub const fn total_changes(&self) -> usize {
        self.added + self.removed + self.modified
    }

    /// Whether anything was added, removed or modified
    #[must_use]
    pub const fn has_changes(&self) -> bool {
        self.total_changes() > 0
    }
}
