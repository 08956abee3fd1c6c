//! Lazy enumeration of files beneath the configured scan roots.
//!
//! Excluded directories are pruned before descent through
//! `walkdir`'s `filter_entry`, so virtual trees such as `/proc` are never
//! read. Directories are also tracked by `(device, inode)` so a bind mount
//! that loops back into an ancestor is entered only once.

use super::ExclusionMatcher;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// What kind of leaf the enumerator produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Regular file (or symlink resolved to one when following links)
    File,
    /// Symbolic link recorded as a leaf, never hashed
    Symlink,
}

impl EntryKind {
    /// Label used in snapshot listings
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Symlink => "symlink",
        }
    }

    /// Parse a listing label
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label {
            "file" => Some(Self::File),
            "symlink" => Some(Self::Symlink),
            _ => None,
        }
    }
}

/// One item produced by [`PathEnumerator::walk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalkItem {
    /// A file to collect
    Entry {
        /// Absolute path
        path: PathBuf,
        /// Leaf kind
        kind: EntryKind,
    },
    /// Listing failed for this path; the walk continues
    Unreadable {
        /// Path that failed (the root when walkdir could not tell)
        path: PathBuf,
        /// Underlying error
        reason: String,
    },
    /// A configured root is itself excluded
    RootSkipped {
        /// The root
        path: PathBuf,
        /// Pattern that excluded it
        pattern: String,
    },
}

/// Walks scan roots and yields files not pruned by the [`ExclusionMatcher`]
pub struct PathEnumerator {
    /// Absolute directories to scan
    roots: Vec<PathBuf>,
    /// Exclusion patterns in effect
    matcher: ExclusionMatcher,
    /// Follow symlinks to directories
    follow_symlinks: bool,
}

impl PathEnumerator {
    /// Create a new enumerator
    ///
    /// # Arguments
    ///
    /// * `roots` - Directories to walk, in order
    /// * `matcher` - Exclusions applied to every entry, roots included
    /// * `follow_symlinks` - Descend through symlinked directories
    #[must_use]
    pub const fn new(roots: Vec<PathBuf>, matcher: ExclusionMatcher, follow_symlinks: bool) -> Self {
        Self {
            roots,
            matcher,
            follow_symlinks,
        }
    }

    /// Walk every root against live filesystem state.
    ///
    /// Each call starts a fresh traversal.
    pub fn walk(&self) -> impl Iterator<Item = WalkItem> + '_ {
        self.roots.iter().flat_map(move |root| self.walk_root(root))
    }

    /// Get the exclusion matcher
    #[must_use]
    pub const fn matcher(&self) -> &ExclusionMatcher {
        &self.matcher
    }

    /// Walks one root, pruning excluded directories before descending.
    fn walk_root<'a>(&'a self, root: &'a Path) -> Box<dyn Iterator<Item = WalkItem> + 'a> {
        if let Some(pattern) = self.matcher.matching_pattern(root) {
            return Box::new(std::iter::once(WalkItem::RootSkipped {
                path: root.to_path_buf(),
                pattern: pattern.to_string(),
            }));
        }

        info!(root = %root.display(), "Scanning");

        let matcher = &self.matcher;
        let mut visited: HashSet<(u64, u64)> = HashSet::new();

        let walker = WalkDir::new(root)
            .follow_links(self.follow_symlinks)
            .into_iter()
            .filter_entry(move |entry| {
                if let Some(pattern) = matcher.matching_pattern(entry.path()) {
                    debug!(path = %entry.path().display(), pattern, "Pruned");
                    return false;
                }
                if entry.file_type().is_dir()
                    && let Some(id) = dir_identity(entry)
                    && !visited.insert(id)
                {
                    debug!(path = %entry.path().display(), "Directory already visited, skipping");
                    return false;
                }
                true
            });

        Box::new(walker.filter_map(move |result| match result {
            Ok(entry) => {
                let file_type = entry.file_type();
                let kind = if file_type.is_file() {
                    EntryKind::File
                } else if file_type.is_symlink() {
                    EntryKind::Symlink
                } else {
                    // Directories, sockets, fifos and device nodes carry no content
                    return None;
                };
                Some(WalkItem::Entry {
                    path: entry.into_path(),
                    kind,
                })
            }
            Err(err) => {
                let path = err.path().unwrap_or(root).to_path_buf();
                debug!(path = %path.display(), error = %err, "Cannot read entry");
                Some(WalkItem::Unreadable {
                    path,
                    reason: err.to_string(),
                })
            }
        }))
    }
}

/// Device and inode, used to break directory cycles.
#[cfg(unix)]
fn dir_identity(entry: &walkdir::DirEntry) -> Option<(u64, u64)> {
    use std::os::unix::fs::MetadataExt;
    entry.metadata().ok().map(|m| (m.dev(), m.ino()))
}

#[cfg(not(unix))]
const fn dir_identity(_entry: &walkdir::DirEntry) -> Option<(u64, u64)> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_structure(root: &Path) -> Result<()> {
        // root/
        //   etc/
        //     hosts
        //     app.conf
        //   home/
        //     alice/.cache/blob
        //     alice/.bashrc
        //     bob/.cache/blob
        //   proc/1/status
        fs::create_dir_all(root.join("etc"))?;
        fs::create_dir_all(root.join("home/alice/.cache"))?;
        fs::create_dir_all(root.join("home/bob/.cache"))?;
        fs::create_dir_all(root.join("proc/1"))?;

        fs::write(root.join("etc/hosts"), "127.0.0.1 localhost\n")?;
        fs::write(root.join("etc/app.conf"), "key=value\n")?;
        fs::write(root.join("home/alice/.cache/blob"), "x")?;
        fs::write(root.join("home/alice/.bashrc"), "# bashrc")?;
        fs::write(root.join("home/bob/.cache/blob"), "y")?;
        fs::write(root.join("proc/1/status"), "running")?;
        Ok(())
    }

    fn enumerator(root: &Path, patterns: &[String]) -> PathEnumerator {
        PathEnumerator::new(
            vec![root.to_path_buf()],
            ExclusionMatcher::new(patterns).unwrap(),
            false,
        )
    }

    fn files(items: impl Iterator<Item = WalkItem>) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = items
            .filter_map(|item| match item {
                WalkItem::Entry { path, .. } => Some(path),
                _ => None,
            })
            .collect();
        paths.sort();
        paths
    }

    #[test]
    fn test_walk_yields_all_files() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;

        let found = files(enumerator(temp.path(), &[]).walk());
        assert_eq!(found.len(), 6);
        Ok(())
    }

    #[test]
    fn test_excluded_directories_pruned() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;
        let root = temp.path().display().to_string();

        let patterns = vec![format!("{root}/proc"), format!("{root}/home/*/.cache")];
        let found = files(enumerator(temp.path(), &patterns).walk());

        assert_eq!(
            found,
            vec![
                temp.path().join("etc/app.conf"),
                temp.path().join("etc/hosts"),
                temp.path().join("home/alice/.bashrc"),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_excluded_root_reported() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;

        let patterns = vec![temp.path().display().to_string()];
        let items: Vec<WalkItem> = enumerator(temp.path(), &patterns).walk().collect();

        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], WalkItem::RootSkipped { .. }));
        Ok(())
    }

    #[test]
    fn test_walk_is_restartable() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;
        let scanner = enumerator(temp.path(), &[]);

        let first = files(scanner.walk());
        fs::write(temp.path().join("etc/new.conf"), "new")?;
        let second = files(scanner.walk());

        assert_eq!(second.len(), first.len() + 1);
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_is_leaf_when_not_following() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;
        std::os::unix::fs::symlink(temp.path().join("etc"), temp.path().join("etc-link"))?;

        let items: Vec<WalkItem> = enumerator(temp.path(), &[]).walk().collect();
        let link = items.iter().find_map(|item| match item {
            WalkItem::Entry { path, kind } if path.ends_with("etc-link") => Some(*kind),
            _ => None,
        });

        assert_eq!(link, Some(EntryKind::Symlink));
        // Nothing beneath the link was visited
        assert!(!files(items.into_iter()).iter().any(|p| p.starts_with(temp.path().join("etc-link/"))));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_loop_terminates_when_following() -> Result<()> {
        let temp = TempDir::new()?;
        create_test_structure(temp.path())?;
        std::os::unix::fs::symlink(temp.path(), temp.path().join("etc/loop"))?;

        let scanner = PathEnumerator::new(
            vec![temp.path().to_path_buf()],
            ExclusionMatcher::default(),
            true,
        );
        let found = files(scanner.walk());

        assert!(found.contains(&temp.path().join("etc/hosts")));
        assert!(!found.iter().any(|p| p.starts_with(temp.path().join("etc/loop/etc"))));
        Ok(())
    }
}
