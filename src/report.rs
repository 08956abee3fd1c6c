//! Human and machine readable change reports.
//!
//! A report is a list of sections, one per category, rendered twice:
//! `full_report.txt` with one `=== <NAME> CHANGES ===` block per section and
//! `report.json` carrying the same diffs plus per-section summaries.

use crate::config::ReportConfig;
use crate::diff::{
    DiffEntry, DiffSummary, MetadataChange, UnifiedDiffConfig, diff_lines, metadata_changes,
    render_fs_diff, render_unified,
};
use crate::error::{ScanWarning, SnapshotError};
use crate::providers::PROVIDER_SECTIONS;
use crate::storage::FileRecord;
use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::collections::HashSet;
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tempfile::NamedTempFile;
use tracing::info;

/// Text report file name inside the session directory
pub const REPORT_FILE: &str = "full_report.txt";
/// JSON report file name inside the session directory
pub const JSON_REPORT_FILE: &str = "report.json";

/// Metadata-level file changes
pub const FILESYSTEM_SECTION: &str = "filesystem";
/// Line diffs of tracked text files
pub const FS_DIFF_SECTION: &str = "fs_diff";
/// Problems met while scanning
pub const WARNINGS_SECTION: &str = "warnings";

/// Body of a section with nothing to report.
const NO_CHANGES: &str = "No changes detected.";

/// Every section name a report can contain, in report order
#[must_use]
pub fn all_sections() -> Vec<&'static str> {
    let mut sections = PROVIDER_SECTIONS.to_vec();
    sections.extend([FILESYSTEM_SECTION, FS_DIFF_SECTION, WARNINGS_SECTION]);
    sections
}

/// Which sections to include, parsed from `all` or `a,b,c`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SectionFilter {
    /// Every known section
    #[default]
    All,
    /// Only the named sections
    Only(HashSet<String>),
}

impl SectionFilter {
    /// Whether `section` should be part of the report
    #[must_use]
    pub fn includes(&self, section: &str) -> bool {
        match self {
            Self::All => true,
            Self::Only(names) => names.contains(section),
        }
    }
}

impl FromStr for SectionFilter {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let names: Vec<&str> = s
            .split(',')
            .map(str::trim)
            .filter(|name| !name.is_empty())
            .collect();

        if names.is_empty() || names.contains(&"all") {
            return Ok(Self::All);
        }

        let known = all_sections();
        if let Some(unknown) = names.iter().copied().find(|name| !known.contains(name)) {
            return Err(SnapshotError::ConfigInvalid(format!(
                "unknown report section '{unknown}', expected 'all' or any of: {}",
                known.join(", ")
            )));
        }

        Ok(Self::Only(names.into_iter().map(ToString::to_string).collect()))
    }
}

/// One category of changes
#[derive(Debug, Clone, Serialize)]
pub struct ReportSection {
    /// Section name, one of [`all_sections`]
    pub name: String,
    /// Change counts, for sections built from a diff
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DiffSummary>,
    /// Permission and ownership changes, filesystem section only
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<MetadataChange>,
    /// Why the section could not be computed; `diff` is empty then
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unavailable: Option<String>,
    /// Rendered changes; empty means nothing changed
    pub diff: String,
}

impl ReportSection {
    /// Compare a provider's before and after text.
    ///
    /// A side that was never captured leaves the section empty.
    #[must_use]
    pub fn text(name: &str, before: Option<&str>, after: Option<&str>, config: &ReportConfig) -> Self {
        let (Some(before), Some(after)) = (before, after) else {
            tracing::debug!(section = name, "Not captured in both phases");
            return Self::raw(name, String::new());
        };

        let entries = diff_lines(before, after);
        let summary = DiffSummary::from_entries(&entries, config.max_examples, |line| {
            (*line).to_string()
        });
        let before_label = format!("{name}_before.txt");
        let after_label = format!("{name}_after.txt");
        let diff = render_unified(
            before,
            after,
            (before_label.as_str(), after_label.as_str()),
            &UnifiedDiffConfig {
                context_lines: config.context_lines,
                colorize: false,
            },
        );

        Self {
            summary: Some(summary),
            ..Self::raw(name, diff)
        }
    }

    /// Metadata-level change list of the filesystem
    #[must_use]
    pub fn filesystem(entries: &[DiffEntry<&FileRecord>], config: &ReportConfig) -> Self {
        let summary = DiffSummary::from_entries(entries, config.max_examples, |record| {
            record.path.display().to_string()
        });

        let metadata = metadata_changes(entries);

        let mut diff = String::new();
        if summary.has_changes() || !metadata.is_empty() {
            let _ = writeln!(
                diff,
                "Added: {}  Removed: {}  Modified: {}  Metadata: {}",
                summary.added,
                summary.removed,
                summary.modified,
                metadata.len()
            );
            diff.push_str(&render_fs_diff(entries));
            for change in &metadata {
                let _ = writeln!(
                    diff,
                    "* {} ({})",
                    change.path.display(),
                    change.changes.join(", ")
                );
            }
        }

        Self {
            summary: Some(summary),
            metadata,
            ..Self::raw(FILESYSTEM_SECTION, diff)
        }
    }

    /// Scan warnings from both phases
    #[must_use]
    pub fn warnings(before: &[ScanWarning], after: &[ScanWarning]) -> Self {
        let mut diff = String::new();
        for (phase, warnings) in [("before", before), ("after", after)] {
            for warning in warnings {
                let _ = writeln!(diff, "[{phase}] {warning}");
            }
        }
        Self::raw(WARNINGS_SECTION, diff)
    }

    /// Section with pre-rendered content and no summary
    #[must_use]
    pub fn raw(name: &str, diff: String) -> Self {
        Self {
            name: name.to_string(),
            summary: None,
            metadata: Vec::new(),
            unavailable: None,
            diff,
        }
    }

    /// Section whose content could not be computed
    #[must_use]
    pub fn unavailable(name: &str, reason: impl Into<String>) -> Self {
        Self {
            unavailable: Some(reason.into()),
            ..Self::raw(name, String::new())
        }
    }

    /// Whether the section lists any change
    #[must_use]
    pub fn has_changes(&self) -> bool {
        !self.diff.trim().is_empty()
    }
}

/// Complete report for one session
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Version of the tool that wrote the report
    pub version: String,
    /// Session name
    pub session: String,
    /// When the report was generated
    pub generated: DateTime<Local>,
    /// Sections in report order
    pub changes: Vec<ReportSection>,
    /// Scan warnings of both phases
    pub warnings: Vec<ScanWarning>,
}

impl Report {
    /// Empty report for `session`, stamped now
    #[must_use]
    pub fn new(session: &str) -> Self {
        Self {
            version: crate::VERSION.to_string(),
            session: session.to_string(),
            generated: Local::now(),
            changes: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Append a section
    pub fn push(&mut self, section: ReportSection) {
        self.changes.push(section);
    }

    /// Look up a section by name
    #[must_use]
    pub fn section(&self, name: &str) -> Option<&ReportSection> {
        self.changes.iter().find(|s| s.name == name)
    }

    /// The human-readable report
    #[must_use]
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "=== System Snapshot Report v{} ===", self.version);
        let _ = writeln!(out, "Session: {}", self.session);
        let _ = writeln!(out, "Generated: {}", self.generated.to_rfc3339());
        out.push('\n');

        for section in &self.changes {
            let _ = writeln!(out, "=== {} CHANGES ===", section.name.to_uppercase());
            if let Some(reason) = &section.unavailable {
                let _ = writeln!(out, "Unavailable: {reason}\n");
            } else if section.has_changes() {
                out.push_str(section.diff.trim_end_matches('\n'));
                out.push_str("\n\n");
            } else {
                let _ = writeln!(out, "{NO_CHANGES}\n");
            }
        }

        out
    }

    /// The JSON report
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write both report files into `dir`, each replaced atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if either file cannot be written.
    pub fn write_to(&self, dir: &Path) -> Result<(PathBuf, PathBuf)> {
        let text_path = dir.join(REPORT_FILE);
        let json_path = dir.join(JSON_REPORT_FILE);

        write_atomic(dir, &text_path, &self.render_text())?;
        write_atomic(dir, &json_path, &self.to_json()?)?;

        info!(report = %text_path.display(), json = %json_path.display(), "Reports written");
        Ok((text_path, json_path))
    }
}

/// Write through a temporary file in `dir`, then rename over `target`
fn write_atomic(dir: &Path, target: &Path, content: &str) -> Result<()> {
    let mut temp = NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    temp.write_all(content.as_bytes())?;
    temp.as_file().sync_all()?;

    temp.persist(target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::diff_snapshots;
    use crate::error::WarningKind;
    use crate::storage::test_support::record;
    use crate::storage::{Phase, Snapshot};
    use std::fs;
    use tempfile::TempDir;

    fn snapshot(phase: Phase, records: Vec<FileRecord>) -> Snapshot {
        Snapshot {
            phase,
            captured_at: chrono::Utc::now(),
            roots: vec!["/".into()],
            excludes: Vec::new(),
            records,
            warnings: Vec::new(),
        }
    }

    #[test]
    fn test_section_filter_parsing() -> Result<()> {
        assert_eq!("all".parse::<SectionFilter>()?, SectionFilter::All);
        assert_eq!("".parse::<SectionFilter>()?, SectionFilter::All);

        let filter: SectionFilter = "packages, filesystem".parse()?;
        assert!(filter.includes("packages"));
        assert!(filter.includes("filesystem"));
        assert!(!filter.includes("ports"));

        assert!(matches!(
            "packagez".parse::<SectionFilter>(),
            Err(SnapshotError::ConfigInvalid(_))
        ));
        Ok(())
    }

    #[test]
    fn test_text_section() {
        let section = ReportSection::text(
            "packages",
            Some("bash\nvim\n"),
            Some("bash\nnano\n"),
            &ReportConfig::default(),
        );

        let summary = section.summary.as_ref().unwrap();
        assert_eq!(summary.added_examples, vec!["nano"]);
        assert_eq!(summary.removed_examples, vec!["vim"]);
        assert!(section.diff.contains("--- packages_before.txt"));
        assert!(section.diff.contains("+nano"));
    }

    #[test]
    fn test_text_section_missing_side() {
        let section = ReportSection::text("ports", None, Some("x\n"), &ReportConfig::default());
        assert!(!section.has_changes());
    }

    #[test]
    fn test_render_text_blocks() {
        let before = snapshot(Phase::Before, vec![record("/etc/a.conf", 1, 1, "a")]);
        let after = snapshot(Phase::After, vec![record("/etc/b.conf", 1, 1, "b")]);
        let entries = diff_snapshots(&before, &after);

        let mut report = Report::new("upgrade");
        report.push(ReportSection::text("packages", Some("x\n"), Some("x\n"), &ReportConfig::default()));
        report.push(ReportSection::filesystem(&entries, &ReportConfig::default()));

        let text = report.render_text();
        assert!(text.starts_with("=== System Snapshot Report v"));
        assert!(text.contains("Session: upgrade"));
        assert!(text.contains("=== PACKAGES CHANGES ===\nNo changes detected."));
        assert!(text.contains("=== FILESYSTEM CHANGES ===\nAdded: 1  Removed: 1  Modified: 0  Metadata: 0"));
        assert!(text.contains("+ /etc/b.conf"));
        assert!(text.contains("- /etc/a.conf"));
    }

    #[test]
    fn test_permission_change_listed() -> Result<()> {
        let b = record("/etc/ssh/sshd_config", 20, 5, "PermitRootLogin no");
        let mut a = b.clone();
        a.mode = 0o100_666;
        let before = snapshot(Phase::Before, vec![b]);
        let after = snapshot(Phase::After, vec![a]);

        let section = ReportSection::filesystem(&diff_snapshots(&before, &after), &ReportConfig::default());
        assert!(section.has_changes());
        assert!(section.diff.contains("Added: 0  Removed: 0  Modified: 0  Metadata: 1"));
        assert!(section.diff.contains("* /etc/ssh/sshd_config (mode 0644 -> 0666)"));

        let mut report = Report::new("perms");
        report.push(section);
        let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
        assert_eq!(json["changes"][0]["metadata"][0]["changes"][0], "mode 0644 -> 0666");
        Ok(())
    }

    #[test]
    fn test_unavailable_section_is_not_no_changes() -> Result<()> {
        let mut report = Report::new("nogit");
        report.push(ReportSection::unavailable(FS_DIFF_SECTION, "git not found on PATH"));

        let text = report.render_text();
        assert!(text.contains("=== FS_DIFF CHANGES ===\nUnavailable: git not found on PATH"));
        assert!(!text.contains("No changes detected."));

        let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
        assert_eq!(json["changes"][0]["unavailable"], "git not found on PATH");
        Ok(())
    }

    #[test]
    fn test_warnings_section() {
        let warning = ScanWarning::new(WarningKind::HashFailed, "/root/x", "Permission denied");
        let section = ReportSection::warnings(&[], &[warning]);
        assert!(section.diff.contains("[after] unreadable during scan: /root/x"));
    }

    #[test]
    fn test_write_both_reports() -> Result<()> {
        let temp = TempDir::new()?;
        let mut report = Report::new("s1");
        report.push(ReportSection::raw(FS_DIFF_SECTION, "diff --git a/x b/x\n".to_string()));

        fs::write(temp.path().join(REPORT_FILE), "stale")?;
        let (text_path, json_path) = report.write_to(temp.path())?;
        assert!(fs::read_to_string(text_path)?.contains("=== FS_DIFF CHANGES ==="));

        // Only the two reports remain, no temporary files
        assert_eq!(fs::read_dir(temp.path())?.count(), 2);

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(json_path)?)?;
        assert_eq!(json["session"], "s1");
        assert_eq!(json["changes"][0]["name"], "fs_diff");
        assert!(json["generated"].is_string());
        Ok(())
    }
}
