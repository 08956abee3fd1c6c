//! A named capture session and the phase workflow around it.
//!
//! A session owns `<snapshot_base_dir>/<name>/`. Capturing a phase runs the
//! text providers, walks and hashes the configured roots, writes the
//! snapshot and mirrors text files into the session's git tree. Reporting
//! compares the two stored phases.

use crate::StatediffContext;
use crate::collector::{Collector, TextClassifier};
use crate::config::Config;
use crate::config::validator::ConfigValidator;
use crate::diff::{DiffEntry, diff_snapshots};
use crate::error::SnapshotError;
use crate::lock::SessionLock;
use crate::providers::{PROVIDER_SECTIONS, TextSnapshotProvider, default_providers};
use crate::report::{
    FILESYSTEM_SECTION, FS_DIFF_SECTION, Report, ReportSection, SectionFilter, WARNINGS_SECTION,
};
use crate::scanner::{ExclusionMatcher, PathEnumerator};
use crate::storage::{FileRecord, Phase, PhaseInfo, Snapshot, SnapshotStore};
use crate::tracker::{GitTracker, RecordOutcome, TrackerState};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::time::Instant;
use tracing::{info, info_span, warn};

/// What one capture produced
#[derive(Debug, Clone)]
pub struct CaptureSummary {
    /// Phase that was captured
    pub phase: Phase,
    /// Path of the written metadata listing
    pub metadata_path: PathBuf,
    /// Files recorded
    pub records: usize,
    /// Per-path problems met
    pub warnings: usize,
    /// Provider categories captured
    pub texts: Vec<String>,
    /// `None` when text tracking was unavailable or failed
    pub tracked: Option<RecordOutcome>,
}

/// A written report and where it went
#[derive(Debug)]
pub struct ReportOutcome {
    /// The report as written
    pub report: Report,
    /// `full_report.txt`
    pub text_path: PathBuf,
    /// `report.json`
    pub json_path: PathBuf,
}

/// Phases present in a session
#[derive(Debug, Clone)]
pub struct SessionStatus {
    /// Session name
    pub name: String,
    /// Session directory
    pub dir: PathBuf,
    /// Header of the `before` capture, if any
    pub before: Option<PhaseInfo>,
    /// Header of the `after` capture, if any
    pub after: Option<PhaseInfo>,
    /// Where the git mirror is in its lifecycle
    pub tracker: TrackerState,
    /// Whether `full_report.txt` exists
    pub report_written: bool,
}

/// Everything known about one path across both phases
#[derive(Debug, Clone)]
pub struct FileChange {
    /// Classification with both records
    pub entry: DiffEntry<FileRecord>,
    /// Line diff from the tracked tree; `None` when the file is not tracked
    pub text_diff: Option<String>,
}

/// One capture session
pub struct Session {
    name: String,
    dir: PathBuf,
    config: Config,
    store: SnapshotStore,
    providers: Vec<Box<dyn TextSnapshotProvider>>,
    show_progress: bool,
}

impl Session {
    /// Open (creating if needed) the session called `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ConfigInvalid`] if `name` is not a single
    /// path component, or an error if the directory cannot be created.
    pub fn open(ctx: &StatediffContext, name: &str) -> Result<Self> {
        validate_name(name)?;

        let dir = ctx.config.scan.snapshot_base_dir.join(name);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;

        Ok(Self {
            name: name.to_string(),
            store: SnapshotStore::new(dir.clone()),
            dir,
            config: ctx.config.clone(),
            providers: default_providers(),
            show_progress: false,
        })
    }

    /// Replace the text providers run on each capture
    #[must_use]
    pub fn with_providers(mut self, providers: Vec<Box<dyn TextSnapshotProvider>>) -> Self {
        self.providers = providers;
        self
    }

    /// Add exclusion patterns on top of the configured ones
    #[must_use]
    pub fn with_excludes(mut self, excludes: &[String]) -> Self {
        for pattern in excludes {
            if !self.config.scan.excludes.contains(pattern) {
                self.config.scan.excludes.push(pattern.clone());
            }
        }
        self
    }

    /// Show a hashing progress line on stderr
    #[must_use]
    pub const fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    /// Session name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Session directory
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Stored snapshots of this session
    #[must_use]
    pub const fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Capture `phase`, replacing any earlier capture of it.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SnapshotMissing`] when capturing `after`
    /// without a `before`, [`SnapshotError::ConfigInvalid`] when the scan
    /// configuration is unusable, or an error if another capture holds the
    /// session or the snapshot cannot be written.
    pub fn capture(&self, phase: Phase) -> Result<CaptureSummary> {
        let _span = info_span!("capture", session = %self.name, phase = %phase).entered();
        let start = Instant::now();

        if phase == Phase::After && !self.store.exists(Phase::Before) {
            return Err(SnapshotError::SnapshotMissing {
                phase: Phase::Before.to_string(),
                session: self.dir.clone(),
            }
            .into());
        }

        let _lock = SessionLock::acquire(&self.dir, phase)?;

        ConfigValidator::validate_for_scan(&self.config)?;
        let matcher = ExclusionMatcher::new(&self.config.effective_excludes())?;
        let captured_at = Utc::now();

        let texts = self.capture_texts(phase)?;

        let enumerator = PathEnumerator::new(
            self.config.scan.dirs_to_scan.clone(),
            matcher,
            self.config.scan.follow_symlinks,
        );
        let collector = Collector::new(
            &self.config.scan,
            TextClassifier::from_config(&self.config.text),
        )
        .with_progress(self.show_progress);
        let outcome = collector.collect(enumerator.walk())?;

        let snapshot = Snapshot {
            phase,
            captured_at,
            roots: self.config.scan.dirs_to_scan.clone(),
            excludes: enumerator.matcher().patterns().map(ToString::to_string).collect(),
            records: outcome.records,
            warnings: outcome.warnings,
        };
        let metadata_path = self.store.write(&snapshot)?;
        let tracked = self.track(phase, &snapshot.records);

        info!(
            records = snapshot.records.len(),
            warnings = snapshot.warnings.len(),
            elapsed = %humantime::format_duration(truncate_millis(start.elapsed())),
            "Capture complete"
        );

        Ok(CaptureSummary {
            phase,
            metadata_path,
            records: snapshot.records.len(),
            warnings: snapshot.warnings.len(),
            texts,
            tracked,
        })
    }

    /// Compare both phases and write `full_report.txt` and `report.json`.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::SnapshotMissing`] if either phase is absent,
    /// [`SnapshotError::SnapshotCorrupt`] if a listing cannot be parsed, or an
    /// error if the reports cannot be written.
    pub fn report(&self, sections: &SectionFilter) -> Result<ReportOutcome> {
        let _span = info_span!("report", session = %self.name).entered();

        let before = self.store.read(Phase::Before)?;
        let after = self.store.read(Phase::After)?;
        let entries = diff_snapshots(&before, &after);
        let config = &self.config.report;

        let mut report = Report::new(&self.name);

        for name in PROVIDER_SECTIONS.iter().copied().filter(|n| sections.includes(n)) {
            let before_text = self.store.read_text(name, Phase::Before)?;
            let after_text = self.store.read_text(name, Phase::After)?;
            report.push(ReportSection::text(
                name,
                before_text.as_deref(),
                after_text.as_deref(),
                config,
            ));
        }

        if sections.includes(FILESYSTEM_SECTION) {
            report.push(ReportSection::filesystem(&entries, config));
        }
        if sections.includes(FS_DIFF_SECTION) {
            report.push(self.tracked_diff());
        }
        if sections.includes(WARNINGS_SECTION) {
            report.push(ReportSection::warnings(&before.warnings, &after.warnings));
        }

        report.warnings = before.warnings.iter().chain(&after.warnings).cloned().collect();

        let (text_path, json_path) = report.write_to(&self.dir)?;
        Ok(ReportOutcome {
            report,
            text_path,
            json_path,
        })
    }

    /// Metadata and line changes of a single path.
    ///
    /// Returns `None` if the path is in neither snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if either phase is missing or unreadable.
    pub fn file_change(&self, path: &Path) -> Result<Option<FileChange>> {
        let before = self.store.read(Phase::Before)?;
        let after = self.store.read(Phase::After)?;

        let Some(entry) = diff_snapshots(&before, &after)
            .into_iter()
            .find(|entry| entry.path() == path)
        else {
            return Ok(None);
        };
        let entry = entry.map(FileRecord::clone);

        let tracked = entry.before.as_ref().is_some_and(FileRecord::is_text)
            || entry.after.as_ref().is_some_and(FileRecord::is_text);
        let text_diff = if tracked {
            let tracker = GitTracker::new(&self.dir, &self.config.git);
            match tracker.availability() {
                Ok(()) => match tracker.file_diff(path) {
                    Ok(diff) => Some(diff),
                    Err(err) => {
                        warn!(path = %path.display(), error = %format!("{err:#}"), "No line diff");
                        None
                    }
                },
                Err(err) => {
                    warn!(%err, "Line diff unavailable");
                    None
                }
            }
        } else {
            None
        };

        Ok(Some(FileChange { entry, text_diff }))
    }

    /// Which phases exist and whether a report was written.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored header cannot be parsed.
    pub fn status(&self) -> Result<SessionStatus> {
        Ok(SessionStatus {
            name: self.name.clone(),
            dir: self.dir.clone(),
            before: self.store.info(Phase::Before)?,
            after: self.store.info(Phase::After)?,
            tracker: GitTracker::new(&self.dir, &self.config.git).state(),
            report_written: self.dir.join(crate::report::REPORT_FILE).is_file(),
        })
    }

    /// Run every provider and store its text. A failing provider leaves a
    /// note in place of its output.
    fn capture_texts(&self, phase: Phase) -> Result<Vec<String>> {
        let mut names = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let name = provider.name();
            let text = provider.capture().unwrap_or_else(|err| {
                warn!(provider = name, error = %format!("{err:#}"), "Provider failed");
                format!("{name} capture failed: {err}\n")
            });
            self.store.write_text(name, phase, &text)?;
            names.push(name.to_string());
        }
        Ok(names)
    }

    /// Mirror text files into git. Never fails the capture.
    fn track(&self, phase: Phase, records: &[FileRecord]) -> Option<RecordOutcome> {
        let tracker = GitTracker::new(&self.dir, &self.config.git);
        if let Err(err) = tracker.availability() {
            warn!(%err, "Skipping text tracking");
            return None;
        }

        match tracker.record_phase(phase, records) {
            Ok(outcome) => Some(outcome),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Text tracking failed");
                None
            }
        }
    }

    /// Line diff of all tracked text files, marked unavailable when git
    /// cannot produce it
    fn tracked_diff(&self) -> ReportSection {
        let tracker = GitTracker::new(&self.dir, &self.config.git);
        if let Err(err) = tracker.availability() {
            warn!(%err, "Text diff skipped");
            let reason = match err {
                SnapshotError::VersionControlUnavailable(reason) => reason,
                other => other.to_string(),
            };
            return ReportSection::unavailable(FS_DIFF_SECTION, reason);
        }

        match tracker.full_diff() {
            Ok(diff) => ReportSection::raw(FS_DIFF_SECTION, diff),
            Err(err) => {
                warn!(error = %format!("{err:#}"), "Text diff failed");
                ReportSection::unavailable(FS_DIFF_SECTION, format!("{err:#}"))
            }
        }
    }
}

/// Session names become a directory under the base, so exactly one normal
/// component is allowed
pub fn validate_name(name: &str) -> Result<(), SnapshotError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) if !name.contains('/') => Ok(()),
        _ => Err(SnapshotError::ConfigInvalid(format!(
            "session name must be a single directory name: '{name}'"
        ))),
    }
}

fn truncate_millis(elapsed: std::time::Duration) -> std::time::Duration {
    std::time::Duration::from_millis(u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::ChangeKind;
    use crate::providers::StaticProvider;
    use tempfile::TempDir;

    struct Fixture {
        _base: TempDir,
        root: TempDir,
        ctx: StatediffContext,
    }

    fn fixture() -> Fixture {
        let base = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();

        let mut config = Config::default();
        config.scan.snapshot_base_dir = base.path().to_path_buf();
        config.scan.dirs_to_scan = vec![root.path().to_path_buf()];
        config.scan.excludes.clear();
        config.scan.max_workers = 2;
        config.git.enabled = false;
        config.logging.log_to_file = false;

        Fixture {
            _base: base,
            root,
            ctx: StatediffContext::new(PathBuf::from("unused.toml"), config),
        }
    }

    fn session(fx: &Fixture, packages: &str) -> Result<Session> {
        Ok(Session::open(&fx.ctx, "test")?
            .with_providers(vec![Box::new(StaticProvider::new("packages", packages))]))
    }

    #[test]
    fn test_session_name_must_be_single_component() {
        assert!(validate_name("upgrade-2024").is_ok());
        for bad in ["", "..", ".", "a/b", "/abs"] {
            assert!(
                matches!(validate_name(bad), Err(SnapshotError::ConfigInvalid(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_after_without_before_fails_first() -> Result<()> {
        let fx = fixture();
        let session = session(&fx, "bash\n")?;

        let err = session.capture(Phase::After).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::SnapshotMissing { .. })
        ));
        // Nothing was scanned or written
        assert!(!session.store().metadata_path(Phase::After).exists());
        assert!(!session.store().text_path("packages", Phase::After).exists());
        Ok(())
    }

    #[test]
    fn test_capture_and_report() -> Result<()> {
        let fx = fixture();
        fs::write(fx.root.path().join("keep.conf"), "a=1\n")?;
        fs::write(fx.root.path().join("gone.conf"), "x\n")?;

        let before = session(&fx, "bash\nvim\n")?.capture(Phase::Before)?;
        assert_eq!(before.records, 2);
        assert_eq!(before.texts, vec!["packages"]);
        assert!(before.tracked.is_none());

        fs::write(fx.root.path().join("keep.conf"), "a=2 changed\n")?;
        fs::remove_file(fx.root.path().join("gone.conf"))?;
        fs::write(fx.root.path().join("new.conf"), "n\n")?;

        let session = session(&fx, "bash\nnano\n")?;
        session.capture(Phase::After)?;

        let outcome = session.report(&SectionFilter::All)?;
        let fs_section = outcome.report.section(FILESYSTEM_SECTION).unwrap();
        let summary = fs_section.summary.as_ref().unwrap();
        assert_eq!((summary.added, summary.removed, summary.modified), (1, 1, 1));

        let packages = outcome.report.section("packages").unwrap();
        assert!(packages.diff.contains("+nano"));
        assert!(packages.diff.contains("-vim"));

        let text = fs::read_to_string(&outcome.text_path)?;
        assert!(text.contains("=== FILESYSTEM CHANGES ==="));
        // Tracking is disabled, which is not the same as no text changes
        assert!(text.contains(
            "=== FS_DIFF CHANGES ===\nUnavailable: text tracking disabled in configuration"
        ));
        assert!(outcome.json_path.is_file());
        Ok(())
    }

    #[test]
    fn test_section_filter_limits_report() -> Result<()> {
        let fx = fixture();
        fs::write(fx.root.path().join("a.txt"), "a\n")?;
        let session = session(&fx, "bash\n")?;
        session.capture(Phase::Before)?;
        session.capture(Phase::After)?;

        let filter: SectionFilter = "filesystem".parse()?;
        let outcome = session.report(&filter)?;
        assert_eq!(outcome.report.changes.len(), 1);
        assert!(outcome.report.section("packages").is_none());
        Ok(())
    }

    #[test]
    fn test_extra_excludes_applied() -> Result<()> {
        let fx = fixture();
        fs::create_dir(fx.root.path().join("cache"))?;
        fs::write(fx.root.path().join("cache/blob"), "x")?;
        fs::write(fx.root.path().join("kept"), "y")?;

        let pattern = fx.root.path().join("cache").to_string_lossy().to_string();
        let summary = session(&fx, "")?
            .with_excludes(&[pattern])
            .capture(Phase::Before)?;
        assert_eq!(summary.records, 1);
        Ok(())
    }

    #[test]
    fn test_file_change_and_status() -> Result<()> {
        let fx = fixture();
        let target = fx.root.path().join("app.conf");
        fs::write(&target, "port=80\n")?;

        let session = session(&fx, "")?;
        let status = session.status()?;
        assert!(status.before.is_none());
        assert_eq!(status.tracker, TrackerState::Uninitialized);

        session.capture(Phase::Before)?;
        fs::write(&target, "port=8080\n")?;
        session.capture(Phase::After)?;

        let change = session.file_change(&target)?.unwrap();
        assert_eq!(change.entry.kind, ChangeKind::Modified);
        // Tracking is disabled in the fixture
        assert!(change.text_diff.is_none());
        assert!(session.file_change(Path::new("/nonexistent"))?.is_none());

        let status = session.status()?;
        assert_eq!(status.before.map(|i| i.record_count), Some(1));
        assert!(status.after.is_some());
        assert!(!status.report_written);
        Ok(())
    }

    #[test]
    fn test_invalid_root_rejected() -> Result<()> {
        let mut fx = fixture();
        fx.ctx.config.scan.dirs_to_scan = vec![PathBuf::from("/definitely/not/here")];
        let err = session(&fx, "")?.capture(Phase::Before).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SnapshotError>(),
            Some(SnapshotError::ConfigInvalid(_))
        ));
        Ok(())
    }
}
