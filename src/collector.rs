//! Per-file metadata capture and content hashing.
//!
//! Metadata is gathered on the calling thread in walk order. Hashing is the
//! only parallel stage: when the files that need a digest add up to at least
//! `min_parallel_size` bytes they are hashed on a dedicated rayon pool of
//! `max_workers` threads, otherwise inline. Results are keyed by path in a
//! `BTreeMap`, so the output order never depends on completion order.

use crate::config::{ScanConfig, TextConfig};
use crate::error::{ScanWarning, WarningKind};
use crate::output::Progress;
use crate::scanner::{EntryKind, WalkItem};
use crate::storage::{FileClass, FileRecord, HashState};
use crate::utils::hash::hash_file;
use crate::utils::thread_pool::build_hash_pool;
use anyhow::Result;
use rayon::prelude::*;
use std::collections::{BTreeMap, HashSet};
use std::fs::{self, Metadata};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, warn};

/// Decides by file name whether a file's content is tracked as text.
#[derive(Debug, Clone)]
pub struct TextClassifier {
    binary_extensions: HashSet<String>,
    text_extensions: HashSet<String>,
    known_text_names: HashSet<String>,
    max_text_file_size: u64,
}

impl TextClassifier {
    /// Classifier from the `[text]` lists; extensions may omit the dot
    #[must_use]
    pub fn from_config(config: &TextConfig) -> Self {
        Self {
            binary_extensions: normalize_extensions(&config.binary_extensions),
            text_extensions: normalize_extensions(&config.text_extensions),
            known_text_names: config.known_text_names.iter().cloned().collect(),
            max_text_file_size: config.max_text_file_size,
        }
    }

    /// Classify a file of `size` bytes at `path`.
    ///
    /// A binary extension always wins. Known names, text extensions and
    /// extensionless names are text; everything else is binary. Text files
    /// above the size limit count as binary.
    #[must_use]
    pub fn classify(&self, path: &Path, size: u64) -> FileClass {
        let class = self.classify_name(path);
        if class == FileClass::Text && size > self.max_text_file_size {
            return FileClass::Binary;
        }
        class
    }

    /// Classification from the file name alone, before any content sniffing.
    fn classify_name(&self, path: &Path) -> FileClass {
        let extension = path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()));

        if let Some(ext) = &extension
            && self.binary_extensions.contains(ext)
        {
            return FileClass::Binary;
        }

        if let Some(name) = path.file_name()
            && self.known_text_names.contains(name.to_string_lossy().as_ref())
        {
            return FileClass::Text;
        }

        match extension {
            None => FileClass::Text,
            Some(ext) if self.text_extensions.contains(&ext) => FileClass::Text,
            Some(_) => FileClass::Binary,
        }
    }
}

impl Default for TextClassifier {
    fn default() -> Self {
        Self::from_config(&TextConfig::default())
    }
}

/// Lowercased, without the leading dot.
fn normalize_extensions(extensions: &[String]) -> HashSet<String> {
    extensions
        .iter()
        .map(|ext| {
            let ext = ext.to_lowercase();
            if ext.starts_with('.') {
                ext
            } else {
                format!(".{ext}")
            }
        })
        .collect()
}

/// Records and warnings produced by one collection run
#[derive(Debug, Default)]
pub struct CollectOutcome {
    /// Sorted by path, paths unique
    pub records: Vec<FileRecord>,
    /// Walk, stat and hash problems in encounter order
    pub warnings: Vec<ScanWarning>,
}

/// Turns enumerated paths into [`FileRecord`]s.
pub struct Collector {
    max_hash_size: u64,
    min_parallel_size: u64,
    max_workers: usize,
    classifier: TextClassifier,
    show_progress: bool,
}

impl Collector {
    /// Collector with the size limits and worker count of `config`
    #[must_use]
    pub fn new(config: &ScanConfig, classifier: TextClassifier) -> Self {
        Self {
            max_hash_size: config.max_hash_size,
            min_parallel_size: config.min_parallel_size,
            max_workers: config.max_workers,
            classifier,
            show_progress: false,
        }
    }

    /// Show a progress line on stderr while hashing
    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Stat and hash every entry produced by the enumerator.
    ///
    /// Per-path failures become warnings. A path seen twice keeps its last
    /// record.
    ///
    /// # Errors
    ///
    /// Returns an error only if the hashing pool cannot be built.
    pub fn collect<I>(&self, items: I) -> Result<CollectOutcome>
    where
        I: IntoIterator<Item = WalkItem>,
    {
        let mut warnings = Vec::new();
        let mut records = Vec::new();

        for item in items {
            match item {
                WalkItem::Entry { path, kind } => match self.stat(&path, kind) {
                    Ok(record) => records.push(record),
                    Err(err) => {
                        warn!(path = %path.display(), error = %err, "Cannot stat file");
                        warnings.push(ScanWarning::new(
                            WarningKind::PathUnreadable,
                            path,
                            err.to_string(),
                        ));
                    }
                },
                WalkItem::Unreadable { path, reason } => {
                    warn!(path = %path.display(), reason, "Cannot read directory entry");
                    warnings.push(ScanWarning::new(WarningKind::PathUnreadable, path, reason));
                }
                WalkItem::RootSkipped { path, pattern } => {
                    warn!(root = %path.display(), pattern, "Scan root is excluded");
                    warnings.push(ScanWarning::new(
                        WarningKind::RootSkipped,
                        path,
                        format!("root excluded by pattern {pattern}"),
                    ));
                }
            }
        }

        self.hash_pending(&mut records, &mut warnings)?;

        let mut by_path: BTreeMap<PathBuf, FileRecord> = BTreeMap::new();
        for record in records {
            let path = record.path.clone();
            if by_path.insert(path.clone(), record).is_some() {
                warn!(path = %path.display(), "Duplicate path, keeping last record");
                warnings.push(ScanWarning::new(
                    WarningKind::DuplicatePath,
                    path,
                    "path recorded more than once; last record kept",
                ));
            }
        }

        let records: Vec<FileRecord> = by_path.into_values().collect();
        info!(
            files = records.len(),
            warnings = warnings.len(),
            "Collection finished"
        );

        Ok(CollectOutcome { records, warnings })
    }

    /// Metadata for one walked path; symlinks are described, not followed.
    fn stat(&self, path: &Path, kind: EntryKind) -> std::io::Result<FileRecord> {
        let metadata = match kind {
            EntryKind::Symlink => fs::symlink_metadata(path)?,
            EntryKind::File => fs::metadata(path)?,
        };
        let (mode, uid, gid, mtime) = ownership(&metadata);
        let size = metadata.len();

        let (class, hash) = match kind {
            EntryKind::Symlink => (FileClass::Binary, HashState::Skipped),
            EntryKind::File => {
                let hash = if size > self.max_hash_size {
                    debug!(path = %path.display(), size, "Above hash size limit");
                    HashState::TooLarge
                } else {
                    // Stays failed unless the hashing pass produces a digest
                    HashState::Failed
                };
                (self.classifier.classify(path, size), hash)
            }
        };

        Ok(FileRecord {
            path: path.to_path_buf(),
            size,
            mtime,
            mode,
            uid,
            gid,
            kind,
            class,
            hash,
        })
    }

    /// Hashes every regular file under the size limit, on the bounded pool once the
    /// total size is worth it.
    fn hash_pending(
        &self,
        records: &mut [FileRecord],
        warnings: &mut Vec<ScanWarning>,
    ) -> Result<()> {
        let pending: Vec<usize> = records
            .iter()
            .enumerate()
            .filter(|(_, r)| r.kind == EntryKind::File && r.hash != HashState::TooLarge)
            .map(|(i, _)| i)
            .collect();

        if pending.is_empty() {
            return Ok(());
        }

        let total_bytes: u64 = pending.iter().map(|&i| records[i].size).sum();
        let progress = self
            .show_progress
            .then(|| Mutex::new(Progress::new("Hashing files", pending.len())));
        let done = AtomicUsize::new(0);

        let hash_one = |index: usize| {
            let result = hash_file(&records[index].path);
            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            if let Some(progress) = &progress
                && let Ok(mut progress) = progress.try_lock()
            {
                progress.update(finished);
            }
            (index, result)
        };

        let results: Vec<(usize, Result<String>)> = if total_bytes < self.min_parallel_size {
            debug!(files = pending.len(), total_bytes, "Hashing inline");
            pending.iter().map(|&i| hash_one(i)).collect()
        } else {
            debug!(
                files = pending.len(),
                total_bytes,
                workers = self.max_workers,
                "Hashing on worker pool"
            );
            let pool = build_hash_pool(self.max_workers)?;
            pool.install(|| pending.par_iter().map(|&i| hash_one(i)).collect())
        };

        if let Some(progress) = progress
            && let Ok(progress) = progress.into_inner()
        {
            progress.finish();
        }

        for (index, result) in results {
            let record = &mut records[index];
            match result {
                Ok(digest) => record.hash = HashState::Digest(digest),
                Err(err) => {
                    warn!(path = %record.path.display(), error = %err, "Unreadable during scan");
                    warnings.push(ScanWarning::new(
                        WarningKind::HashFailed,
                        record.path.clone(),
                        err.to_string(),
                    ));
                }
            }
        }

        Ok(())
    }
}

/// Mode, uid, gid and mtime in seconds.
#[cfg(unix)]
fn ownership(metadata: &Metadata) -> (u32, u32, u32, i64) {
    use std::os::unix::fs::MetadataExt;
    (metadata.mode(), metadata.uid(), metadata.gid(), metadata.mtime())
}

#[cfg(not(unix))]
fn ownership(metadata: &Metadata) -> (u32, u32, u32, i64) {
    let mtime = metadata
        .modified()
        .ok()
        .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
        .and_then(|d| i64::try_from(d.as_secs()).ok())
        .unwrap_or(0);
    (0, 0, 0, mtime)
}
