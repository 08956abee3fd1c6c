/// TOML parsing and value checks
pub mod parser;
/// Unknown-key detection and scan prerequisites
pub mod validator;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Immutable run configuration, loaded once and passed to every component.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// What to scan and how
    #[serde(default)]
    pub scan: ScanConfig,

    /// Text/binary classification used by the git tracker
    #[serde(default)]
    pub text: TextConfig,

    /// Git mirror of text files
    #[serde(default)]
    pub git: GitConfig,

    /// Report rendering
    #[serde(default)]
    pub report: ReportConfig,

    /// Log level and session log file
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[scan]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScanConfig {
    /// Directory holding one subdirectory per session
    #[serde(default = "default_snapshot_base_dir")]
    pub snapshot_base_dir: PathBuf,
    /// Absolute roots to walk
    #[serde(default = "default_dirs_to_scan")]
    pub dirs_to_scan: Vec<PathBuf>,
    /// Absolute literal or glob patterns pruned from the walk
    #[serde(default = "default_excludes")]
    pub excludes: Vec<String>,
    /// Threads in the hashing pool
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    /// Files above this size are recorded without a digest
    #[serde(default = "default_max_hash_size")]
    pub max_hash_size: u64,
    /// Below this aggregate size hashing stays on the calling thread
    #[serde(default = "default_min_parallel_size")]
    pub min_parallel_size: u64,
    /// Descend into symlinked directories instead of recording links
    #[serde(default)]
    pub follow_symlinks: bool,
}

/// `[text]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextConfig {
    /// Extensions never treated as text; wins over the other lists
    #[serde(default = "default_binary_extensions")]
    pub binary_extensions: Vec<String>,
    /// Extensions treated as text
    #[serde(default = "default_text_extensions")]
    pub text_extensions: Vec<String>,
    /// Whole file names treated as text, e.g. `.bashrc`
    #[serde(default = "default_known_text_names")]
    pub known_text_names: Vec<String>,
    /// Larger text files are not mirrored into the git tree
    #[serde(default = "default_max_text_file_size")]
    pub max_text_file_size: u64,
}

/// `[git]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GitConfig {
    /// Mirror text files into git at all
    #[serde(default = "default_git_enabled")]
    pub enabled: bool,
    /// Commit author name
    #[serde(default = "default_git_user_name")]
    pub user_name: String,
    /// Commit author email
    #[serde(default = "default_git_user_email")]
    pub user_email: String,
}

/// `[report]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportConfig {
    /// Context lines around each unified diff hunk
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
    /// Representative paths listed per change kind in the summary
    #[serde(default = "default_max_examples")]
    pub max_examples: usize,
}

/// `[logging]` table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Also write `snapshot.log` inside the session directory
    #[serde(default = "default_log_to_file")]
    pub log_to_file: bool,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            snapshot_base_dir: default_snapshot_base_dir(),
            dirs_to_scan: default_dirs_to_scan(),
            excludes: default_excludes(),
            max_workers: default_max_workers(),
            max_hash_size: default_max_hash_size(),
            min_parallel_size: default_min_parallel_size(),
            follow_symlinks: false,
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            binary_extensions: default_binary_extensions(),
            text_extensions: default_text_extensions(),
            known_text_names: default_known_text_names(),
            max_text_file_size: default_max_text_file_size(),
        }
    }
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            enabled: default_git_enabled(),
            user_name: default_git_user_name(),
            user_email: default_git_user_email(),
        }
    }
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            context_lines: default_context_lines(),
            max_examples: default_max_examples(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_to_file: default_log_to_file(),
        }
    }
}

impl Config {
    /// Load configuration from a file, falling back to built-in defaults
    /// when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read, is not valid
    /// TOML, or fails value validation.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        }

        parser::parse_config_file(path)
    }

    /// Save configuration to a file
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Cannot create parent directories
    /// - Cannot write to the file
    /// - TOML serialization fails
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let toml_str = self.to_toml()?;
        let mut file = std::fs::File::create(path)?;
        file.write_all(toml_str.as_bytes())?;
        Ok(())
    }

    /// Render the configuration as pretty TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if TOML serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Exclusion patterns in effect for a scan: the configured list plus the
    /// snapshot storage directory, so captures never scan themselves.
    #[must_use]
    pub fn effective_excludes(&self) -> Vec<String> {
        let mut excludes = self.scan.excludes.clone();
        let base = self.scan.snapshot_base_dir.to_string_lossy().to_string();
        if !excludes.contains(&base) {
            excludes.push(base);
        }
        excludes
    }
}

/// Available parallelism, falling back to 1.
static NUM_CPUS: std::sync::LazyLock<usize> = std::sync::LazyLock::new(|| {
    std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1)
});

// Default functions for serde
fn default_snapshot_base_dir() -> PathBuf {
    PathBuf::from(crate::DEFAULT_SNAPSHOT_BASE_DIR)
}

fn default_dirs_to_scan() -> Vec<PathBuf> {
    vec![PathBuf::from("/")]
}

fn default_excludes() -> Vec<String> {
    [
        "/tmp",
        "/proc",
        "/sys",
        "/dev",
        "/run",
        "/var/lib/rpm/__db.*",
        "/home/*/.cache",
        "/var/log/journal",
        "/var/lib/samba/msg.lock",
        "/var/lib/samba/private/msg.sock",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_max_workers() -> usize {
    (*NUM_CPUS + 4).min(32)
}

const fn default_max_hash_size() -> u64 {
    1 << 30 // 1 GiB
}

const fn default_min_parallel_size() -> u64 {
    1_048_576 // 1MB
}

fn default_binary_extensions() -> Vec<String> {
    [
        ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".ico", ".tiff", ".so", ".o", ".a", ".ko",
        ".pyc", ".pyo", ".db", ".sqlite", ".sqlite3", ".bak", ".swp", ".swo", ".pdf", ".doc",
        ".docx", ".xls", ".xlsx", ".ppt", ".pptx", ".zip", ".tar", ".gz", ".bz2", ".xz", ".7z",
        ".rar", ".mp3", ".mp4", ".avi", ".mkv", ".wav", ".ogg",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_text_extensions() -> Vec<String> {
    [
        ".txt", ".conf", ".cfg", ".ini", ".sh", ".bash", ".log", ".py", ".json", ".yaml",
        ".yml", ".xml", ".md", ".toml", ".service", ".rules", ".list", ".repo",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

fn default_known_text_names() -> Vec<String> {
    [
        ".bashrc",
        ".bash_profile",
        ".bash_logout",
        ".bash_history",
        ".profile",
        ".xprofile",
        ".rpmmacros",
        ".lpoptions",
    ]
    .iter()
    .map(ToString::to_string)
    .collect()
}

const fn default_max_text_file_size() -> u64 {
    1_048_576 // 1MB
}

const fn default_git_enabled() -> bool {
    true
}

fn default_git_user_name() -> String {
    "Snapshot Script".to_string()
}

fn default_git_user_email() -> String {
    "snapshot@local".to_string()
}

const fn default_context_lines() -> usize {
    3
}

const fn default_max_examples() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_to_file() -> bool {
    true
}
