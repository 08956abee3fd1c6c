//! # Text Content Tracking
//!
//! Text files are mirrored into a per-session git working tree so that
//! line-level changes can be shown after the fact:
//!
//! ```text
//! /etc/ssh/sshd_config  ->  <session>/fs_git/etc/ssh/sshd_config
//! ```
//!
//! Each capture phase becomes one commit tagged with the phase name, so a
//! session's history is always `before` then `after`. Re-capturing a phase
//! adds a new commit and moves the tag.
//!
//! Binary files are never copied, and neither is anything inside a `.git`
//! directory of the scanned tree. Files that disappeared since the last
//! phase are removed from the tree before committing, so git records them as
//! deletions. Ignore files copied from the host (`.gitignore`) do not hide
//! anything from the commit.
//!
//! All git invocations run on the calling thread. Failures are categorized
//! through [`errors::GitError`].

use crate::config::GitConfig;
use crate::error::SnapshotError;
use crate::storage::{FileRecord, Phase};
use anyhow::{Context, Result};
use std::collections::HashSet;
use std::ffi::OsStr;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

/// Git error categorization
pub mod errors;

use errors::GitError;

/// Directory name of the mirrored tree inside a session
pub const GIT_TREE_DIR: &str = "fs_git";

/// Lifecycle of a session's tracked tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    /// No repository yet
    Uninitialized,
    /// Repository exists without any phase commit
    Initialized,
    /// Latest phase recorded
    Committed(Phase),
}

/// Counts from one [`GitTracker::record_phase`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Text files copied into the tree
    pub copied: usize,
    /// Stale mirrored files removed
    pub removed: usize,
    /// Text files that could not be copied
    pub skipped: usize,
}

/// Mirrors text files of a capture into git
pub struct GitTracker {
    /// `<session>/fs_git`
    repo_path: PathBuf,
    enabled: bool,
    user_name: String,
    user_email: String,
}

impl GitTracker {
    /// Tracker for `<session_dir>/fs_git`; no git command runs yet
    #[must_use]
    pub fn new(session_dir: &Path, config: &GitConfig) -> Self {
        Self {
            repo_path: session_dir.join(GIT_TREE_DIR),
            enabled: config.enabled,
            user_name: config.user_name.clone(),
            user_email: config.user_email.clone(),
        }
    }

    /// Path of the mirrored working tree
    #[must_use]
    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    /// Check that tracking is enabled and git is installed.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::VersionControlUnavailable`] otherwise.
    pub fn availability(&self) -> Result<(), SnapshotError> {
        if !self.enabled {
            return Err(SnapshotError::VersionControlUnavailable(
                "text tracking disabled in configuration".to_string(),
            ));
        }
        which::which("git").map_err(|e| {
            SnapshotError::VersionControlUnavailable(format!("git not found on PATH: {e}"))
        })?;
        Ok(())
    }

    /// Where the tracked tree is in its lifecycle
    #[must_use]
    pub fn state(&self) -> TrackerState {
        if !self.repo_path.join(".git").is_dir() {
            return TrackerState::Uninitialized;
        }

        let latest = [Phase::After, Phase::Before]
            .into_iter()
            .find(|phase| self.has_tag(*phase));
        latest.map_or(TrackerState::Initialized, TrackerState::Committed)
    }

    /// Whether `phase` has been committed
    #[must_use]
    pub fn has_tag(&self, phase: Phase) -> bool {
        self.git(&["rev-parse", "-q", "--verify", &tag_ref(phase)])
            .is_ok()
    }

    /// Create the repository and set its commit identity.
    ///
    /// Does nothing when the repository already exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or a git command
    /// fails.
    pub fn ensure_initialized(&self) -> Result<()> {
        if self.repo_path.join(".git").is_dir() {
            return Ok(());
        }

        fs::create_dir_all(&self.repo_path).with_context(|| {
            format!(
                "Failed to create tracking directory: {}",
                self.repo_path.display()
            )
        })?;

        self.git(&["init", "-q"])?;
        self.git(&["config", "user.name", &self.user_name])?;
        self.git(&["config", "user.email", &self.user_email])?;

        info!(path = %self.repo_path.display(), "Initialized text tracking repository");
        Ok(())
    }

    /// Mirror the text files of a capture and commit them as `phase`.
    ///
    /// # Errors
    ///
    /// Returns an error if the repository cannot be initialized, stale files
    /// cannot be removed, or committing and tagging fail. Individual files
    /// that cannot be copied are skipped with a warning.
    pub fn record_phase(&self, phase: Phase, records: &[FileRecord]) -> Result<RecordOutcome> {
        self.ensure_initialized()?;

        let mut outcome = RecordOutcome::default();
        let mut wanted: Vec<(&Path, PathBuf)> = Vec::new();
        for record in records.iter().filter(|r| r.is_text()) {
            match mirror_relative(&record.path) {
                Some(relative) => wanted.push((&record.path, relative)),
                None => debug!(path = %record.path.display(), "Path cannot be mirrored"),
            }
        }

        let keep: HashSet<&Path> = wanted.iter().map(|(_, rel)| rel.as_path()).collect();
        outcome.removed = self.remove_stale(&keep)?;

        for (source, relative) in &wanted {
            let dest = self.repo_path.join(relative);
            let copied = dest
                .parent()
                .map_or(Ok(()), fs::create_dir_all)
                .and_then(|()| fs::copy(source, &dest));

            match copied {
                Ok(_) => outcome.copied += 1,
                Err(err) => {
                    warn!(path = %source.display(), error = %err, "Cannot mirror text file");
                    outcome.skipped += 1;
                }
            }
        }

        let message = format!("Snapshot ({phase})");
        self.git(&[
            "-c",
            "core.excludesFile=/dev/null",
            "add",
            "--all",
            "--force",
        ])?;
        self.git(&["commit", "-q", "--no-gpg-sign", "--allow-empty", "-m", &message])?;
        self.git(&["tag", "-f", phase.as_str()])?;

        info!(
            phase = %phase,
            copied = outcome.copied,
            removed = outcome.removed,
            skipped = outcome.skipped,
            "Text files committed"
        );
        Ok(outcome)
    }

    /// Line diff of one file between the `before` and `after` commits.
    ///
    /// Empty when the file did not change.
    ///
    /// # Errors
    ///
    /// Returns an error if either phase is missing or git fails.
    pub fn file_diff(&self, path: &Path) -> Result<String> {
        let relative = mirror_relative(path)
            .with_context(|| format!("Path cannot be tracked: {}", path.display()))?;
        let relative = relative.to_string_lossy();
        self.git(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            &tag_ref(Phase::Before),
            &tag_ref(Phase::After),
            "--",
            &relative,
        ])
    }

    /// Line diff of every tracked file between `before` and `after`.
    ///
    /// # Errors
    ///
    /// Returns an error if either phase is missing or git fails.
    pub fn full_diff(&self) -> Result<String> {
        self.git(&[
            "diff",
            "--no-color",
            "--no-ext-diff",
            &tag_ref(Phase::Before),
            &tag_ref(Phase::After),
        ])
    }

    /// Remove mirrored files not in `keep` and prune emptied directories.
    ///
    /// The repository's own `.git` is pruned from the walk before descent.
    fn remove_stale(&self, keep: &HashSet<&Path>) -> Result<usize> {
        let git_dir = self.repo_path.join(".git");
        let mut removed = 0;
        let mut dirs = Vec::new();

        let entries = WalkDir::new(&self.repo_path)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| e.path() != git_dir);

        for entry in entries {
            let entry = entry.context("Failed to walk tracking directory")?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
                continue;
            }
            let relative = entry.path().strip_prefix(&self.repo_path)?;
            if !keep.contains(relative) {
                fs::remove_file(entry.path()).with_context(|| {
                    format!("Failed to remove stale copy: {}", entry.path().display())
                })?;
                removed += 1;
            }
        }

        // Walk order lists parents first, so reversed it empties children first
        for dir in dirs.iter().rev() {
            // Fails for non-empty directories, which stay
            let _ = fs::remove_dir(dir);
        }

        if removed > 0 {
            debug!(removed, "Removed stale mirrored files");
        }
        Ok(removed)
    }

    /// Run git in the tracked tree and return its stdout
    fn git(&self, args: &[&str]) -> Result<String> {
        let output = Command::new("git")
            .args(args)
            .current_dir(&self.repo_path)
            .stdin(Stdio::null())
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .with_context(|| format!("Failed to run git {}", args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let subcommand = args
                .iter()
                .find(|arg| !arg.starts_with('-') && !arg.contains('='))
                .copied()
                .unwrap_or_default();
            let command = format!("git {subcommand}");
            return Err(GitError::from_stderr(&command, &stderr).into());
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Fully qualified tag name, so a tracked file called `before` is never
/// mistaken for the revision
fn tag_ref(phase: Phase) -> String {
    format!("refs/tags/{phase}")
}

/// `/etc/hosts` becomes `etc/hosts`. Paths through any `.git` directory,
/// which git would treat as a repository of its own, and paths that climb
/// out of the tree are refused.
fn mirror_relative(path: &Path) -> Option<PathBuf> {
    let relative: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::RootDir | Component::Prefix(_)))
        .collect();

    if relative.as_os_str().is_empty() {
        return None;
    }
    let refused = relative.components().any(|c| match c {
        Component::Normal(name) => name == OsStr::new(".git"),
        _ => true,
    });

    (!refused).then_some(relative)
}
