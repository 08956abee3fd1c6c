mod common;

use anyhow::Result;
use assert_cmd::Command;
use common::TestHost;
use predicates::prelude::*;
use std::fs;

fn statediff(host: &TestHost) -> Result<Command> {
    let mut cmd = Command::cargo_bin("statediff")?;
    cmd.env("STATEDIFF_CONFIG", host.config_path())
        .env_remove("RUST_LOG")
        .env("NO_COLOR", "1");
    Ok(cmd)
}

#[test]
fn test_after_without_before_fails() -> Result<()> {
    let host = TestHost::new()?;

    statediff(&host)?
        .args(["after", "never-started"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Run 'before' first"));

    // Nothing was captured for the missing phase
    let session_dir = host.ctx.session_dir("never-started");
    assert!(!session_dir.join("fs_after.txt").exists());
    Ok(())
}

#[test]
fn test_before_after_report_flow() -> Result<()> {
    let host = TestHost::new()?;
    host.write("etc/app.conf", "port=80\n")?;
    host.write("var/old.log", "old\n")?;

    statediff(&host)?
        .args(["before", "upgrade"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Before snapshot saved"));

    host.write("etc/app.conf", "port=8080\n")?;
    fs::remove_file(host.path("var/old.log"))?;
    host.write("etc/new.conf", "x=1\n")?;

    statediff(&host)?
        .args(["after", "upgrade"])
        .assert()
        .success()
        .stdout(predicate::str::contains("filesystem"))
        .stderr(predicate::str::contains("full_report.txt"));

    let added = host.path("etc/new.conf").display().to_string();
    let removed = host.path("var/old.log").display().to_string();
    statediff(&host)?
        .args(["report", "upgrade", "--sections", "filesystem", "--print"])
        .assert()
        .success()
        .stdout(predicate::str::contains("=== FILESYSTEM CHANGES ==="))
        .stdout(predicate::str::contains("Added: 1  Removed: 1  Modified: 1"))
        .stdout(predicate::str::contains(format!("+ {added}")))
        .stdout(predicate::str::contains(format!("- {removed}")))
        .stdout(predicate::str::contains("PACKAGES").not());

    let session_dir = host.ctx.session_dir("upgrade");
    assert!(session_dir.join("full_report.txt").is_file());
    assert!(session_dir.join("report.json").is_file());
    assert!(session_dir.join("fs_before.txt").is_file());
    assert!(session_dir.join("fs_hashes_after.txt").is_file());
    Ok(())
}

#[test]
fn test_json_report_on_stdout() -> Result<()> {
    let host = TestHost::new()?;
    host.write("a.txt", "a\n")?;

    statediff(&host)?.args(["before", "json"]).assert().success();
    host.write("a.txt", "changed\n")?;
    statediff(&host)?.args(["after", "json"]).assert().success();

    let output = statediff(&host)?
        .args(["report", "json", "--sections", "filesystem", "--json"])
        .output()?;
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["session"], "json");
    assert_eq!(json["changes"][0]["name"], "filesystem");
    assert_eq!(json["changes"][0]["summary"]["modified"], 1);
    Ok(())
}

#[test]
fn test_unknown_section_rejected_before_scanning() -> Result<()> {
    let host = TestHost::new()?;
    host.write("a.txt", "a\n")?;
    statediff(&host)?.args(["before", "typo"]).assert().success();

    statediff(&host)?
        .args(["after", "typo", "--sections", "filesystm"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown report section 'filesystm'"));

    assert!(!host.ctx.session_dir("typo").join("fs_after.txt").exists());
    Ok(())
}

#[test]
fn test_session_name_must_be_plain() -> Result<()> {
    let host = TestHost::new()?;
    statediff(&host)?
        .args(["before", "../escape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("single directory name"));
    Ok(())
}

#[test]
fn test_show_single_file() -> Result<()> {
    let host = TestHost::new()?;
    let conf = host.write("app.conf", "debug=false\n")?;

    statediff(&host)?.args(["before", "show"]).assert().success();
    fs::write(&conf, "debug=true\n")?;
    statediff(&host)?.args(["after", "show"]).assert().success();

    statediff(&host)?
        .arg("show")
        .arg("show")
        .arg(&conf)
        .assert()
        .success()
        .stdout(predicate::str::contains("(modified)"))
        .stdout(predicate::str::contains("before:"))
        .stdout(predicate::str::contains("after:"));

    statediff(&host)?
        .args(["show", "show", "/no/such/file"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("neither snapshot"));
    Ok(())
}

#[test]
fn test_status_lists_and_describes_sessions() -> Result<()> {
    let host = TestHost::new()?;
    host.write("a.txt", "a\n")?;
    statediff(&host)?.args(["before", "alpha"]).assert().success();

    statediff(&host)?
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("alpha"));

    statediff(&host)?
        .args(["status", "alpha"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 files"))
        .stdout(predicate::str::contains("not captured"));

    statediff(&host)?
        .args(["status", "missing"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No session named 'missing'"));
    Ok(())
}

#[test]
fn test_config_show_and_validate() -> Result<()> {
    let host = TestHost::new()?;

    statediff(&host)?
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[scan]"))
        .stdout(predicate::str::contains("max_workers = 2"));

    statediff(&host)?
        .args(["config", "validate"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Configuration is valid"));
    Ok(())
}

#[test]
fn test_unknown_config_option_warned() -> Result<()> {
    let host = TestHost::new()?;
    let path = host.state.path().join("typo.toml");
    fs::write(&path, "[scan]\ncolour = true\n")?;

    Command::cargo_bin("statediff")?
        .arg("--config")
        .arg(&path)
        .env_remove("RUST_LOG")
        .args(["config", "show"])
        .assert()
        .success()
        .stderr(predicate::str::contains("Unknown configuration option"))
        .stderr(predicate::str::contains("scan.colour"));
    Ok(())
}

#[cfg(unix)]
#[test]
fn test_permission_change_in_summary() -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let host = TestHost::new()?;
    let script = host.write("bin/deploy.sh", "echo hi\n")?;
    fs::set_permissions(&script, fs::Permissions::from_mode(0o644))?;

    statediff(&host)?.args(["before", "chmod"]).assert().success();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

    statediff(&host)?
        .args(["after", "chmod"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1 metadata"));

    let report = fs::read_to_string(host.ctx.session_dir("chmod").join("full_report.txt"))?;
    assert!(report.contains(&format!("* {} (mode 0644 -> 0755)", script.display())));
    Ok(())
}

#[test]
fn test_config_validate_rejects_missing_root() -> Result<()> {
    let host = TestHost::new()?;
    let path = host.state.path().join("broken.toml");
    fs::write(&path, "[scan]\ndirs_to_scan = [\"/definitely/not/a/dir\"]\n")?;

    Command::cargo_bin("statediff")?
        .arg("--config")
        .arg(&path)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
    Ok(())
}

#[test]
fn test_completion_generation() -> Result<()> {
    Command::cargo_bin("statediff")?
        .args(["completion", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("statediff"));
    Ok(())
}
