//! Exclusion matching for scan roots.
//!
//! Every pattern is an absolute path and excludes the path it names together
//! with everything beneath it. Two kinds of pattern exist:
//!
//! - literal paths such as `/proc`, compared component-wise, so `/proc`
//!   excludes `/proc/1/status` but not `/processes`
//! - glob paths such as `/home/*/.cache`, where a wildcard stands for part of
//!   exactly one path component and never crosses a `/`
//!
//! A glob excludes a path when it matches that path or one of its ancestors.

use crate::error::SnapshotError;
use glob::{MatchOptions, Pattern};
use std::path::{Path, PathBuf};

/// `*` never crosses a path separator.
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: false,
};

/// One compiled exclusion
#[derive(Debug, Clone)]
enum Rule {
    /// Component-wise prefix
    Literal(PathBuf),
    /// Wildcard pattern with its component count
    Glob {
        pattern: Pattern,
        /// Number of path components the pattern spans (`None` for `**`)
        depth: Option<usize>,
    },
}

/// Evaluates paths against the configured exclusion patterns.
#[derive(Debug, Clone, Default)]
pub struct ExclusionMatcher {
    /// Compiled rules, in configuration order
    rules: Vec<(String, Rule)>,
}

impl ExclusionMatcher {
    /// Compile exclusion patterns.
    ///
    /// # Errors
    ///
    /// Returns [`SnapshotError::ConfigInvalid`] if a pattern is empty, not
    /// absolute, or not a valid glob.
    pub fn new(patterns: &[String]) -> Result<Self, SnapshotError> {
        let mut rules = Vec::with_capacity(patterns.len());

        for raw in patterns {
            let trimmed = if raw.len() > 1 {
                raw.trim_end_matches('/')
            } else {
                raw.as_str()
            };

            if trimmed.is_empty() || !trimmed.starts_with('/') {
                return Err(SnapshotError::ConfigInvalid(format!(
                    "exclusion pattern must be an absolute path: '{raw}'"
                )));
            }

            let rule = if trimmed.contains(['*', '?', '[']) {
                let pattern = Pattern::new(trimmed).map_err(|e| {
                    SnapshotError::ConfigInvalid(format!(
                        "malformed exclusion pattern '{raw}': {e}"
                    ))
                })?;
                let depth = if trimmed.contains("**") {
                    None
                } else {
                    Some(Path::new(trimmed).components().count())
                };
                Rule::Glob { pattern, depth }
            } else {
                Rule::Literal(PathBuf::from(trimmed))
            };

            rules.push((raw.clone(), rule));
        }

        Ok(Self { rules })
    }

    /// Whether `path` or any of its ancestors is excluded.
    #[must_use]
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.matching_pattern(path).is_some()
    }

    /// The first pattern that excludes `path`, if any.
    #[must_use]
    pub fn matching_pattern(&self, path: &Path) -> Option<&str> {
        if self.rules.is_empty() {
            return None;
        }

        let total = path.components().count();

        self.rules
            .iter()
            .find(|(_, rule)| match rule {
                Rule::Literal(prefix) => path.starts_with(prefix),
                Rule::Glob {
                    pattern,
                    depth: Some(depth),
                } => total >= *depth
                    && path
                        .ancestors()
                        .nth(total - depth)
                        .is_some_and(|ancestor| pattern.matches_path_with(ancestor, MATCH_OPTIONS)),
                Rule::Glob {
                    pattern,
                    depth: None,
                } => path
                    .ancestors()
                    .any(|ancestor| pattern.matches_path_with(ancestor, MATCH_OPTIONS)),
            })
            .map(|(raw, _)| raw.as_str())
    }

    /// Patterns in configuration order
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|(raw, _)| raw.as_str())
    }

    /// Whether no patterns are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
