use super::Config;
use anyhow::{Context, Result};
use memmap2::MmapOptions;
use std::fs::File;
use std::path::Path;

/// Read and parse a TOML configuration file, then check its values.
///
/// # Errors
///
/// Returns an error if the file cannot be read, is not UTF-8, is not valid
/// TOML, or contains out-of-range values.
pub fn parse_config_file(path: &Path) -> Result<Config> {
    let metadata = std::fs::metadata(path)?;

    if metadata.len() < 4096 {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        parse_config_str(&content)
    } else {
        // Large file - use memory mapping
        let file = File::open(path)?;
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let content = simdutf8::basic::from_utf8(&mmap)
            .map_err(|e| anyhow::anyhow!("Invalid UTF-8 in config file: {e}"))?;

        parse_config_str(content)
    }
}

/// Parses TOML text and fills in defaults for missing keys.
pub(crate) fn parse_config_str(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse TOML config")?;

    validate_values(&config)?;
    Ok(config)
}

/// Range checks that do not touch the filesystem.
fn validate_values(config: &Config) -> Result<()> {
    if config.scan.max_workers == 0 {
        anyhow::bail!("scan.max_workers must be at least 1");
    }

    if config.scan.max_workers > 256 {
        anyhow::bail!("scan.max_workers cannot exceed 256");
    }

    if config.scan.dirs_to_scan.is_empty() {
        anyhow::bail!("scan.dirs_to_scan must list at least one directory");
    }

    if config.git.enabled && !config.git.user_email.contains('@') {
        anyhow::bail!("Invalid git.user_email: {}", config.git.user_email);
    }

    Ok(())
}
