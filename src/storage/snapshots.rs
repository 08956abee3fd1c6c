//! Snapshot persistence.
//!
//! A phase is stored as three files inside the session directory:
//!
//! ```text
//! fs_<phase>.txt         path  size  mtime  mode  uid  gid  kind  class
//! fs_hashes_<phase>.txt  path  <sha256 | TOO_LARGE | HASH_FAILED | SKIPPED>
//! snapshot_<phase>.toml  phase, capture time, roots, excludes, warnings
//! ```
//!
//! Listings are tab-separated, one record per line, sorted by path. Tabs,
//! newlines and backslashes inside paths are escaped. Every file is written
//! to a temporary sibling and renamed into place; the header goes last, so a
//! phase without a header is treated as never captured.

use super::{FileClass, FileRecord, HashState, Phase, Snapshot, normalize_records};
use crate::error::{ScanWarning, SnapshotError};
use crate::scanner::EntryKind;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info};

/// Snapshot header stored as TOML
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotHeader {
    phase: Phase,
    captured_at: DateTime<Utc>,
    record_count: usize,
    roots: Vec<PathBuf>,
    excludes: Vec<String>,
    #[serde(default)]
    warnings: Vec<ScanWarning>,
}

/// Summary of a captured phase, read from its header alone
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseInfo {
    /// Captured phase
    pub phase: Phase,
    /// When the capture finished
    pub captured_at: DateTime<Utc>,
    /// Files in the metadata listing
    pub record_count: usize,
    /// Per-path problems met during the capture
    pub warning_count: usize,
}

/// Reads and writes the snapshots of one session directory
pub struct SnapshotStore {
    /// Session directory holding all phase files
    session_dir: PathBuf,
}

impl SnapshotStore {
    /// Store rooted at `session_dir`; nothing is touched until a write
    #[must_use]
    pub const fn new(session_dir: PathBuf) -> Self {
        Self { session_dir }
    }

    /// Session directory this store writes into
    #[must_use]
    pub fn session_dir(&self) -> &Path {
        &self.session_dir
    }

    /// Path of the metadata listing for `phase`
    #[must_use]
    pub fn metadata_path(&self, phase: Phase) -> PathBuf {
        self.session_dir.join(format!("fs_{phase}.txt"))
    }

    /// Path of the hash listing for `phase`
    #[must_use]
    pub fn hashes_path(&self, phase: Phase) -> PathBuf {
        self.session_dir.join(format!("fs_hashes_{phase}.txt"))
    }

    /// Path of the header for `phase`
    #[must_use]
    pub fn header_path(&self, phase: Phase) -> PathBuf {
        self.session_dir.join(format!("snapshot_{phase}.toml"))
    }

    /// Path of a provider's captured text for `phase`
    #[must_use]
    pub fn text_path(&self, name: &str, phase: Phase) -> PathBuf {
        self.session_dir.join(format!("{name}_{phase}.txt"))
    }

    /// Whether a complete snapshot exists for `phase`
    #[must_use]
    pub fn exists(&self, phase: Phase) -> bool {
        self.header_path(phase).is_file() && self.metadata_path(phase).is_file()
    }

    /// Write a snapshot, fully replacing any earlier one for the same phase.
    ///
    /// Records must already be sorted by path with unique paths.
    ///
    /// # Errors
    ///
    /// Returns an error if the session directory cannot be created or any
    /// file cannot be written and renamed into place.
    pub fn write(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.session_dir).with_context(|| {
            format!(
                "Failed to create session directory: {}",
                self.session_dir.display()
            )
        })?;

        debug_assert!(
            snapshot.records.windows(2).all(|w| w[0].path < w[1].path),
            "snapshot records must be sorted and unique"
        );

        let phase = snapshot.phase;
        let header_path = self.header_path(phase);
        if header_path.exists() {
            fs::remove_file(&header_path).with_context(|| {
                format!("Failed to remove old header: {}", header_path.display())
            })?;
        }

        let metadata_path = self.metadata_path(phase);
        self.write_atomic(&metadata_path, |out| {
            for record in &snapshot.records {
                writeln!(out, "{}", format_metadata_line(record))?;
            }
            Ok(())
        })?;

        self.write_atomic(&self.hashes_path(phase), |out| {
            for record in &snapshot.records {
                writeln!(
                    out,
                    "{}\t{}",
                    escape_path(&record.path),
                    record.hash.as_field()
                )?;
            }
            Ok(())
        })?;

        let header = SnapshotHeader {
            phase,
            captured_at: snapshot.captured_at,
            record_count: snapshot.records.len(),
            roots: snapshot.roots.clone(),
            excludes: snapshot.excludes.clone(),
            warnings: snapshot.warnings.clone(),
        };
        let header_toml = toml::to_string_pretty(&header)?;
        self.write_atomic(&header_path, |out| {
            out.write_all(header_toml.as_bytes())?;
            Ok(())
        })?;

        info!(
            phase = %phase,
            records = snapshot.records.len(),
            path = %metadata_path.display(),
            "Snapshot written"
        );

        Ok(metadata_path)
    }

    /// Read back the snapshot for `phase`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SnapshotMissing`] if the phase was never
    /// captured and [`SnapshotError::SnapshotCorrupt`] if a listing cannot be
    /// parsed.
    pub fn read(&self, phase: Phase) -> Result<Snapshot> {
        if !self.exists(phase) {
            return Err(SnapshotError::SnapshotMissing {
                phase: phase.to_string(),
                session: self.session_dir.clone(),
            }
            .into());
        }

        let header = self.read_header(phase)?;
        let hashes = self.read_hashes(phase)?;
        let records = self.read_metadata(phase, &hashes)?;
        let (records, duplicate_warnings) = normalize_records(records);

        let mut warnings = header.warnings;
        warnings.extend(duplicate_warnings);

        debug!(phase = %phase, records = records.len(), "Snapshot read");

        Ok(Snapshot {
            phase: header.phase,
            captured_at: header.captured_at,
            roots: header.roots,
            excludes: header.excludes,
            records,
            warnings,
        })
    }

    /// Header details of a captured phase without loading its listings.
    ///
    /// Returns `None` if the phase was never captured.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SnapshotCorrupt`] if the header cannot be parsed.
    pub fn info(&self, phase: Phase) -> Result<Option<PhaseInfo>> {
        if !self.exists(phase) {
            return Ok(None);
        }
        let header = self.read_header(phase)?;
        Ok(Some(PhaseInfo {
            phase: header.phase,
            captured_at: header.captured_at,
            record_count: header.record_count,
            warning_count: header.warnings.len(),
        }))
    }

    /// Loads `snapshot_<phase>.toml`.
    fn read_header(&self, phase: Phase) -> Result<SnapshotHeader> {
        let header_path = self.header_path(phase);
        let header_text = fs::read_to_string(&header_path)
            .with_context(|| format!("Failed to read header: {}", header_path.display()))?;
        let header = toml::from_str(&header_text).map_err(|e| SnapshotError::SnapshotCorrupt {
            path: header_path.clone(),
            line: 0,
            reason: e.to_string(),
        })?;
        Ok(header)
    }

    /// Store a provider's captured text for `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn write_text(&self, name: &str, phase: Phase, text: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.session_dir)?;
        let path = self.text_path(name, phase);
        self.write_atomic(&path, |out| {
            out.write_all(text.as_bytes())?;
            Ok(())
        })?;
        Ok(path)
    }

    /// Load a provider's captured text for `phase`, if it was captured.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn read_text(&self, name: &str, phase: Phase) -> Result<Option<String>> {
        let path = self.text_path(name, phase);
        if !path.is_file() {
            return Ok(None);
        }
        let bytes = fs::read(&path).with_context(|| format!("Failed to read {}", path.display()))?;
        Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Loads `fs_hashes_<phase>.txt` keyed by path.
    fn read_hashes(&self, phase: Phase) -> Result<BTreeMap<PathBuf, HashState>> {
        let path = self.hashes_path(phase);
        let mut hashes = BTreeMap::new();

        if !path.is_file() {
            return Ok(hashes);
        }

        let reader = BufReader::new(
            fs::File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?,
        );

        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let corrupt = |reason: &str| SnapshotError::SnapshotCorrupt {
                path: path.clone(),
                line: index + 1,
                reason: reason.to_string(),
            };

            let (raw_path, field) = line
                .rsplit_once('\t')
                .ok_or_else(|| corrupt("expected two tab-separated fields"))?;
            let file_path = unescape_path(raw_path).ok_or_else(|| corrupt("bad path escape"))?;
            let state = HashState::parse(field).ok_or_else(|| corrupt("unknown hash value"))?;
            hashes.insert(file_path, state);
        }

        Ok(hashes)
    }

    /// Loads `fs_<phase>.txt`, joining each record with its hash entry.
    fn read_metadata(
        &self,
        phase: Phase,
        hashes: &BTreeMap<PathBuf, HashState>,
    ) -> Result<Vec<FileRecord>> {
        let path = self.metadata_path(phase);
        let reader = BufReader::new(
            fs::File::open(&path).with_context(|| format!("Failed to open {}", path.display()))?,
        );

        let mut records = Vec::new();
        for (index, line) in reader.lines().enumerate() {
            let line = line?;
            if line.is_empty() {
                continue;
            }
            let corrupt = |reason: &str| SnapshotError::SnapshotCorrupt {
                path: path.clone(),
                line: index + 1,
                reason: reason.to_string(),
            };

            let mut record = parse_metadata_line(&line).ok_or_else(|| corrupt("malformed record"))?;
            // Duplicate lines share one hash entry
            record.hash = hashes
                .get(&record.path)
                .cloned()
                .ok_or_else(|| corrupt("no hash entry for path"))?;
            records.push(record);
        }

        Ok(records)
    }

    /// Writes through a temp file in the session directory, then renames over `target`.
    fn write_atomic<F>(&self, target: &Path, fill: F) -> Result<()>
    where
        F: FnOnce(&mut BufWriter<&mut NamedTempFile>) -> Result<()>,
    {
        let mut temp = NamedTempFile::new_in(&self.session_dir).with_context(|| {
            format!(
                "Failed to create temporary file in {}",
                self.session_dir.display()
            )
        })?;

        {
            let mut out = BufWriter::new(&mut temp);
            fill(&mut out)?;
            out.flush()?;
        }
        temp.as_file().sync_all()?;

        temp.persist(target)
            .with_context(|| format!("Failed to replace {}", target.display()))?;
        Ok(())
    }
}

/// One tab-separated line of `fs_<phase>.txt`.
fn format_metadata_line(record: &FileRecord) -> String {
    let mut line = escape_path(&record.path);
    let _ = write!(
        line,
        "\t{}\t{}\t{:o}\t{}\t{}\t{}\t{}",
        record.size,
        record.mtime,
        record.mode,
        record.uid,
        record.gid,
        record.kind.as_str(),
        record.class.as_str()
    );
    line
}

fn parse_metadata_line(line: &str) -> Option<FileRecord> {
    let mut fields = line.split('\t');
    let path = unescape_path(fields.next()?)?;
    let size = fields.next()?.parse().ok()?;
    let mtime = fields.next()?.parse().ok()?;
    let mode = u32::from_str_radix(fields.next()?, 8).ok()?;
    let uid = fields.next()?.parse().ok()?;
    let gid = fields.next()?.parse().ok()?;
    let kind = EntryKind::parse(fields.next()?)?;
    let class = FileClass::parse(fields.next()?)?;

    if fields.next().is_some() {
        return None;
    }

    Some(FileRecord {
        path,
        size,
        mtime,
        mode,
        uid,
        gid,
        kind,
        class,
        hash: HashState::Skipped,
    })
}

/// Escape a path for a tab-separated listing.
///
/// Valid UTF-8 paths keep their characters; other paths fall back to `\xNN`
/// for every byte outside printable ASCII.
#[must_use]
pub fn escape_path(path: &Path) -> String {
    let bytes = path.as_os_str().as_encoded_bytes();
    let mut out = String::with_capacity(bytes.len());

    if let Ok(text) = std::str::from_utf8(bytes) {
        for ch in text.chars() {
            match ch {
                '\\' => out.push_str("\\\\"),
                '\t' => out.push_str("\\t"),
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                c => out.push(c),
            }
        }
    } else {
        for &b in bytes {
            match b {
                b'\\' => out.push_str("\\\\"),
                b'\t' => out.push_str("\\t"),
                b'\n' => out.push_str("\\n"),
                b'\r' => out.push_str("\\r"),
                0x20..=0x7e => out.push(char::from(b)),
                _ => {
                    let _ = write!(out, "\\x{b:02x}");
                }
            }
        }
    }

    out
}

/// Reverse of [`escape_path`]
#[must_use]
pub fn unescape_path(field: &str) -> Option<PathBuf> {
    let mut bytes = Vec::with_capacity(field.len());
    let mut iter = field.bytes();

    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        match iter.next()? {
            b'\\' => bytes.push(b'\\'),
            b't' => bytes.push(b'\t'),
            b'n' => bytes.push(b'\n'),
            b'r' => bytes.push(b'\r'),
            b'x' => {
                let hi = char::from(iter.next()?).to_digit(16)?;
                let lo = char::from(iter.next()?).to_digit(16)?;
                bytes.push(u8::try_from(hi * 16 + lo).ok()?);
            }
            _ => return None,
        }
    }

    bytes_to_path(bytes)
}

#[cfg(unix)]
fn bytes_to_path(bytes: Vec<u8>) -> Option<PathBuf> {
    use std::os::unix::ffi::OsStringExt;
    Some(PathBuf::from(std::ffi::OsString::from_vec(bytes)))
}

#[cfg(not(unix))]
fn bytes_to_path(bytes: Vec<u8>) -> Option<PathBuf> {
    String::from_utf8(bytes).ok().map(PathBuf::from)
}
