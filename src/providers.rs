//! External text snapshots.
//!
//! Each provider captures one category of host state as an opaque text
//! blob, stored per phase as `<name>_<phase>.txt` and later compared line by
//! line. Providers never fail a capture for ordinary reasons: a missing
//! program or log file produces placeholder text and a warning.

use anyhow::{Context, Result};
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use tracing::{debug, warn};

/// One category of captured host state
pub trait TextSnapshotProvider: Send + Sync {
    /// Category name, used for file names and report sections
    fn name(&self) -> &str;

    /// Capture the current state as text
    ///
    /// # Errors
    ///
    /// Returns an error only for unexpected failures; missing tools are
    /// reported through placeholder text.
    fn capture(&self) -> Result<String>;
}

/// Runs a command and keeps its stdout
#[derive(Debug, Clone)]
pub struct CommandProvider {
    name: String,
    program: String,
    args: Vec<String>,
    /// Replaces stdout when the command exits unsuccessfully
    failure_text: Option<String>,
}

impl CommandProvider {
    /// Provider running `program args...`
    #[must_use]
    pub fn new(name: &str, program: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            program: program.to_string(),
            args: args.iter().map(ToString::to_string).collect(),
            failure_text: None,
        }
    }

    /// Text recorded instead of stdout when the exit status is non-zero.
    ///
    /// Without it the exit status is ignored.
    #[must_use]
    pub fn with_failure_text(mut self, text: &str) -> Self {
        self.failure_text = Some(text.to_string());
        self
    }
}

impl TextSnapshotProvider for CommandProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&self) -> Result<String> {
        let output = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .output();

        let output = match output {
            Ok(output) => output,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                warn!(provider = %self.name, program = %self.program, "Program not found");
                return Ok(format!("{} not available\n", self.program));
            }
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("Failed to run {} for {}", self.program, self.name)
                });
            }
        };

        if !output.status.success() {
            debug!(provider = %self.name, status = %output.status, "Command exited unsuccessfully");
            if let Some(text) = &self.failure_text {
                return Ok(text.clone());
            }
        }

        Ok(decode_output(&output.stdout))
    }
}

/// Copies the first existing file out of a list of candidates
#[derive(Debug, Clone)]
pub struct LogFileProvider {
    name: String,
    candidates: Vec<PathBuf>,
}

impl LogFileProvider {
    /// Provider reading the first existing file of `candidates`
    #[must_use]
    pub const fn new(name: String, candidates: Vec<PathBuf>) -> Self {
        Self { name, candidates }
    }
}

impl TextSnapshotProvider for LogFileProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&self) -> Result<String> {
        let Some(path) = self.candidates.iter().find(|p| p.is_file()) else {
            warn!(provider = %self.name, "No system log found");
            return Ok("System log not found\n".to_string());
        };

        let bytes =
            std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
        debug!(provider = %self.name, path = %path.display(), bytes = bytes.len(), "Log captured");
        Ok(decode_output(&bytes))
    }
}

/// Fixed text, for tests and scripted captures
#[derive(Debug, Clone)]
pub struct StaticProvider {
    name: String,
    text: String,
}

impl StaticProvider {
    /// Provider that always returns `text`
    #[must_use]
    pub fn new(name: &str, text: &str) -> Self {
        Self {
            name: name.to_string(),
            text: text.to_string(),
        }
    }
}

impl TextSnapshotProvider for StaticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn capture(&self) -> Result<String> {
        Ok(self.text.clone())
    }
}

/// Command output as text, replacing invalid UTF-8
fn decode_output(bytes: &[u8]) -> String {
    simdutf8::basic::from_utf8(bytes).map_or_else(
        |_| String::from_utf8_lossy(bytes).into_owned(),
        ToOwned::to_owned,
    )
}

/// Package listing command for the host's package manager, if any
fn package_provider() -> Option<CommandProvider> {
    if which::which("rpm").is_ok() {
        return Some(CommandProvider::new(
            "packages",
            "rpm",
            &["-qa", "--queryformat", "%{NAME}\n"],
        ));
    }
    if which::which("dpkg-query").is_ok() {
        return Some(CommandProvider::new(
            "packages",
            "dpkg-query",
            &["-W", "-f=${binary:Package}\n"],
        ));
    }
    warn!("Neither rpm nor dpkg-query found, skipping package listing");
    None
}

/// Providers captured on every phase, in report order
#[must_use]
pub fn default_providers() -> Vec<Box<dyn TextSnapshotProvider>> {
    let mut providers: Vec<Box<dyn TextSnapshotProvider>> = Vec::new();

    if let Some(packages) = package_provider() {
        providers.push(Box::new(packages));
    }

    providers.push(Box::new(CommandProvider::new("processes", "ps", &["aux"])));
    providers.push(Box::new(CommandProvider::new(
        "services",
        "systemctl",
        &["list-units", "--all", "--no-pager"],
    )));
    providers.push(Box::new(CommandProvider::new("ports", "ss", &["-tulpn"])));
    providers.push(Box::new(CommandProvider::new("passwd", "getent", &["passwd"])));
    providers.push(Box::new(CommandProvider::new("group", "getent", &["group"])));
    providers.push(Box::new(
        CommandProvider::new("cron", "crontab", &["-l"]).with_failure_text("No crontab"),
    ));
    providers.push(Box::new(LogFileProvider::new(
        "logs".to_string(),
        vec![
            PathBuf::from("/var/log/syslog"),
            PathBuf::from("/var/log/messages"),
        ],
    )));

    providers
}

/// Names of all categories [`default_providers`] can produce
pub const PROVIDER_SECTIONS: &[&str] = &[
    "packages",
    "processes",
    "services",
    "ports",
    "passwd",
    "group",
    "cron",
    "logs",
];
