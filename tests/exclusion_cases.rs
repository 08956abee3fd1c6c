use anyhow::Result;
use rstest::rstest;
use statediff::error::SnapshotError;
use statediff::scanner::{ExclusionMatcher, PathEnumerator, WalkItem};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn matcher(patterns: &[&str]) -> ExclusionMatcher {
    let patterns: Vec<String> = patterns.iter().map(ToString::to_string).collect();
    ExclusionMatcher::new(&patterns).unwrap()
}

#[rstest]
#[case("/proc", "/proc", true)]
#[case("/proc", "/proc/1/status", true)]
#[case("/proc", "/processes", false)]
#[case("/tmp/", "/tmp/x", true)]
#[case("/home/*/.cache", "/home/alice/.cache", true)]
#[case("/home/*/.cache", "/home/bob/.cache/pip/wheel", true)]
#[case("/home/*/.cache", "/home/alice/.config", false)]
#[case("/home/*/.cache", "/home/alice/nested/.cache", false)]
#[case("/home/*/.cache", "/srv/alice/.cache", false)]
#[case("/var/lib/rpm/__db.*", "/var/lib/rpm/__db.001", true)]
#[case("/var/lib/rpm/__db.*", "/var/lib/rpm/Packages", false)]
#[case("/var/log/journal", "/var/log/journald.conf", false)]
fn test_exclusion(#[case] pattern: &str, #[case] path: &str, #[case] excluded: bool) {
    assert_eq!(
        matcher(&[pattern]).is_excluded(Path::new(path)),
        excluded,
        "{pattern} vs {path}"
    );
}

#[rstest]
#[case("")]
#[case("relative/path")]
#[case("/bad/[pattern")]
fn test_invalid_pattern(#[case] pattern: &str) {
    let result = ExclusionMatcher::new(&[pattern.to_string()]);
    assert!(matches!(result, Err(SnapshotError::ConfigInvalid(_))));
}

#[rstest]
#[case::alice("alice")]
#[case::bob("bob")]
#[case::service_account("svc-backup")]
fn test_enumerator_skips_every_users_cache(#[case] user: &str) -> Result<()> {
    let temp = TempDir::new()?;
    let home = temp.path().join("home").join(user);
    fs::create_dir_all(home.join(".cache/thumbs"))?;
    fs::write(home.join(".cache/thumbs/a.png"), "x")?;
    fs::write(home.join(".bashrc"), "alias ll='ls -l'\n")?;

    let pattern = format!("{}/home/*/.cache", temp.path().display());
    let enumerator = PathEnumerator::new(vec![temp.path().to_path_buf()], matcher(&[&pattern]), false);

    let files: Vec<_> = enumerator
        .walk()
        .filter_map(|item| match item {
            WalkItem::Entry { path, .. } => Some(path),
            _ => None,
        })
        .collect();

    assert_eq!(files, vec![home.join(".bashrc")]);
    Ok(())
}
