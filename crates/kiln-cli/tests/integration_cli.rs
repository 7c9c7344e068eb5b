//! Command-line behavior of the `kiln` binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn kiln(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("kiln").unwrap();
    cmd.current_dir(dir.path())
        .env("CI", "true")
        .env("NO_COLOR", "1")
        .env_remove("KILN_SERVER__ARTIFACT")
        .env_remove("KILN_BUILD__ARTIFACT");
    cmd
}

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    kiln(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("dev"))
        .stdout(predicate::str::contains("test"));
}

#[test]
fn test_dev_without_artifact_fails() {
    let dir = TempDir::new().unwrap();
    kiln(&dir)
        .args(["dev", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No build artifact configured"));
}

#[test]
fn test_missing_resource_directory_fails() {
    let dir = TempDir::new().unwrap();
    kiln(&dir)
        .args(["test", "-a", "app.wasm", "-r", "static"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("static"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("kiln.toml"), "[watch]\ndebounce_ms = 0\n").unwrap();
    kiln(&dir)
        .args(["dev", "-a", "app.wasm", "--", "true"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("debounce"));
}

#[test]
fn test_pipes_require_each_other() {
    let dir = TempDir::new().unwrap();
    kiln(&dir)
        .args(["dev", "--request-pipe", "req"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--response-pipe"));
}
