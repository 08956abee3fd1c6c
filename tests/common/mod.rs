#![allow(dead_code)]

use anyhow::Result;
use statediff::StatediffContext;
use statediff::config::Config;
use statediff::providers::{StaticProvider, TextSnapshotProvider};
use statediff::session::Session;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A scan root and a snapshot base directory, both temporary
pub struct TestHost {
    /// Directory tree being captured
    pub root: TempDir,
    /// Holds the sessions and the config file
    pub state: TempDir,
    pub ctx: StatediffContext,
}

impl TestHost {
    /// Host with git tracking off, so tests run without git installed
    pub fn new() -> Result<Self> {
        Self::with_git(false)
    }

    pub fn with_git(enabled: bool) -> Result<Self> {
        let root = TempDir::new()?;
        let state = TempDir::new()?;

        let mut config = Config::default();
        config.scan.snapshot_base_dir = state.path().join("sessions");
        config.scan.dirs_to_scan = vec![root.path().to_path_buf()];
        config.scan.excludes = Vec::new();
        config.scan.max_workers = 2;
        config.git.enabled = enabled;
        config.logging.log_to_file = false;

        let config_path = state.path().join("config.toml");
        config.save(&config_path)?;

        Ok(Self {
            root,
            state,
            ctx: StatediffContext::new(config_path, config),
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.ctx.config_path
    }

    /// Absolute path of `relative` under the scan root
    pub fn path(&self, relative: &str) -> PathBuf {
        self.root.path().join(relative)
    }

    /// Write a file under the scan root, creating parents
    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> Result<PathBuf> {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, contents)?;
        Ok(path)
    }

    /// Session with fixed provider output instead of real host commands
    pub fn session(&self, name: &str, packages: &str) -> Result<Session> {
        let providers: Vec<Box<dyn TextSnapshotProvider>> =
            vec![Box::new(StaticProvider::new("packages", packages))];
        Ok(Session::open(&self.ctx, name)?.with_providers(providers))
    }
}

/// Whether git is installed; tests of the tracked tree are skipped otherwise
pub fn git_available() -> bool {
    which::which("git").is_ok()
}
