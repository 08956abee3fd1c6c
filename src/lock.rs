//! Session locking so two captures never write the same session at once.
//!
//! The lock is an advisory exclusive lock on `<session>/.lock`, released
//! when the guard is dropped or the process exits. The file itself is left
//! in place; it only carries the holder's details for diagnostics.

use crate::storage::Phase;
use anyhow::{Context, Result, bail};
use fs4::fs_std::FileExt;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tracing::debug;

/// Lock file name inside a session directory
pub const LOCK_FILE: &str = ".lock";

/// Holds the exclusive lock on one session directory
pub struct SessionLock {
    /// Lock file handle
    lock_file: File,
    /// Path to the lock file (for error messages)
    lock_path: PathBuf,
}

impl SessionLock {
    /// Acquire the session lock for capturing `phase`
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The lock file cannot be created
    /// - Another capture holds the lock past the timeout
    pub fn acquire(session_dir: &Path, phase: Phase) -> Result<Self> {
        let lock_path = session_dir.join(LOCK_FILE);

        // Use shorter timeouts in test mode for faster test execution
        let lock_timeout = if cfg!(test) {
            Duration::from_millis(100)
        } else {
            Duration::from_secs(5)
        };
        let retry_interval = if cfg!(test) {
            Duration::from_millis(10)
        } else {
            Duration::from_millis(100)
        };

        let start = Instant::now();

        loop {
            // Opened without truncation so a holder's details survive a failed attempt
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&lock_path)
                .with_context(|| format!("Failed to create lock file: {}", lock_path.display()))?;

            match file.try_lock_exclusive() {
                Ok(true) => {
                    let mut file_ref = &file;
                    let _ = file.set_len(0);
                    let _ = writeln!(
                        file_ref,
                        "phase={}\npid={}\ntime={}",
                        phase,
                        std::process::id(),
                        humantime::format_rfc3339(SystemTime::now())
                    );
                    debug!(path = %lock_path.display(), "Session lock acquired");
                    return Ok(Self {
                        lock_file: file,
                        lock_path,
                    });
                }
                Ok(false) | Err(_) if start.elapsed() < lock_timeout => {
                    std::thread::sleep(retry_interval);
                }
                Ok(false) | Err(_) => {
                    let holder = std::fs::read_to_string(&lock_path).unwrap_or_default();
                    bail!(
                        "Another capture is already running in {}. \
                         Wait for it to complete.\n{}",
                        session_dir.display(),
                        holder.trim()
                    );
                }
            }
        }
    }

    /// Path of the lock file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for SessionLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.lock_file);
    }
}
