//! Small helpers shared across the crate.
//!
//! - [`hash`]: SHA-256 content digests
//! - [`thread_pool`]: the bounded hashing pool

/// SHA-256 hashing of files and buffers
pub mod hash;
/// Thread pool construction for hashing
pub mod thread_pool;

use chrono::{DateTime, Local, TimeZone};

/// Formats a size in bytes for display, e.g. `1.50 MB`.
/// Human-readable size, e.g. `1.50 MB`
#[must_use]
#[allow(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss
)]
pub fn format_size(size: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = size as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", size.round() as u64, UNITS[unit_index])
    } else {
        format!("{:.2} {}", size, UNITS[unit_index])
    }
}

/// Formats an mtime in seconds since the epoch as local time.
#[must_use]
pub fn format_mtime(seconds: i64) -> String {
    Local.timestamp_opt(seconds, 0).single().map_or_else(
        || seconds.to_string(),
        |time: DateTime<Local>| time.format("%Y-%m-%d %H:%M:%S").to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5 * 1024 * 1024 * 1024), "5.00 GB");
    }

    #[test]
    fn test_format_mtime() {
        let formatted = format_mtime(1_700_000_000);
        assert_eq!(formatted.len(), "2023-11-14 22:13:20".len());
        assert!(formatted.starts_with("2023-11-1"));
    }
}
