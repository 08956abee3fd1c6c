use crate::config::Config;
use crate::error::SnapshotError;
use crate::scanner::ExclusionMatcher;
use anyhow::Result;
use colored::Colorize;
use std::collections::HashSet;
use std::path::Path;

/// Checks a configuration before any scanning begins.
pub struct ConfigValidator {
    /// Set of valid configuration fields
    known_fields: HashSet<String>,
}

impl ConfigValidator {
    /// Create a new validator with known configuration fields
    #[must_use]
    pub fn new() -> Self {
        let known_fields = [
            "scan.snapshot_base_dir",
            "scan.dirs_to_scan",
            "scan.excludes",
            "scan.max_workers",
            "scan.max_hash_size",
            "scan.min_parallel_size",
            "scan.follow_symlinks",
            "text.binary_extensions",
            "text.text_extensions",
            "text.known_text_names",
            "text.max_text_file_size",
            "git.enabled",
            "git.user_name",
            "git.user_email",
            "report.context_lines",
            "report.max_examples",
            "logging.level",
            "logging.log_to_file",
        ]
        .iter()
        .map(ToString::to_string)
        .collect();

        Self { known_fields }
    }

    /// Warn on stderr about fields the configuration file sets but nothing reads.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn validate_config_file(&self, config_path: &Path) -> Result<()> {
        let unknown = self.unknown_fields(config_path)?;

        if !unknown.is_empty() {
            eprintln!("{}", "Configuration warnings:".yellow().bold());
            for field in unknown {
                eprintln!("  Unknown configuration field: {}", field.yellow());
            }
            eprintln!();
        }

        Ok(())
    }

    /// List dotted keys present in the file that are not recognised.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file cannot be read or parsed
    pub fn unknown_fields(&self, config_path: &Path) -> Result<Vec<String>> {
        if !config_path.exists() {
            return Ok(Vec::new());
        }

        let content = std::fs::read_to_string(config_path)?;
        let parsed: toml::Value = toml::from_str(&content)?;

        let mut unknown = Vec::new();
        self.check_table(&parsed, "", &mut unknown);
        Ok(unknown)
    }

    /// Recursively checks a TOML table for unknown fields
    fn check_table(&self, table: &toml::Value, prefix: &str, unknown: &mut Vec<String>) {
        if let toml::Value::Table(map) = table {
            for (key, value) in map {
                let full_key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };

                if self.known_fields.contains(&full_key) {
                    continue;
                }

                if let toml::Value::Table(_) = value {
                    self.check_table(value, &full_key, unknown);
                } else {
                    unknown.push(full_key);
                }
            }
        }
    }

    /// Filesystem-level checks required before a capture: every root must be
    /// an existing directory and every exclusion pattern must compile.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ConfigInvalid`] describing the first problem.
    pub fn validate_for_scan(config: &Config) -> Result<(), SnapshotError> {
        for root in &config.scan.dirs_to_scan {
            if !root.is_absolute() {
                return Err(SnapshotError::ConfigInvalid(format!(
                    "scan root must be absolute: {}",
                    root.display()
                )));
            }
            if !root.is_dir() {
                return Err(SnapshotError::ConfigInvalid(format!(
                    "scan root does not exist or is not a directory: {}",
                    root.display()
                )));
            }
        }

        ExclusionMatcher::new(&config.effective_excludes())?;

        if config.scan.snapshot_base_dir.as_os_str().is_empty() {
            return Err(SnapshotError::ConfigInvalid(
                "scan.snapshot_base_dir is empty".to_string(),
            ));
        }

        Ok(())
    }
}

impl Default for ConfigValidator {
    fn default() -> Self {
        Self::new()
    }
}
