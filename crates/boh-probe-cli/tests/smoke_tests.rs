//! Smoke tests for the boh-probe binary

#![allow(deprecated)] // Command::cargo_bin
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Command for the binary with a clean configuration environment
fn boh_probe() -> Command {
    let mut cmd = Command::cargo_bin("boh-probe").expect("boh-probe binary should exist");
    for key in ["ENV", "CI", "BOH_BASE_URL", "BOH_ACCOUNT", "BOH_PASSWORD", "BOH_BRAND_ALIAS", "RUST_LOG"] {
        cmd.env_remove(key);
    }
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    boh_probe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_help_lists_commands() {
    boh_probe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_no_args_fails() {
    boh_probe().assert().failure();
}

#[test]
fn test_run_help_shows_flags() {
    boh_probe()
        .args(["run", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--output-dir"))
        .stdout(predicate::str::contains("--headed"))
        .stdout(predicate::str::contains("--chromium-path"));
}

// ============================================================================
// Config Command
// ============================================================================

#[test]
fn test_config_show_masks_password() {
    boh_probe()
        .args(["config", "--show"])
        .env("BOH_PASSWORD", "s3cret-pass")
        .assert()
        .success()
        .stdout(predicate::str::contains("s3cret-pass").not())
        .stdout(predicate::str::contains("***"))
        .stdout(predicate::str::contains("saas-boh-qa.example"));
}

#[test]
fn test_config_show_json_for_production() {
    let output = boh_probe()
        .args(["config", "--show", "--format", "json", "--env", "production"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(value["profile"]["environment"], "production");
    assert_eq!(value["profile"]["credentials"]["password"], "***");
}

#[test]
fn test_env_variable_selects_environment() {
    boh_probe()
        .arg("config")
        .env("ENV", "production")
        .assert()
        .success()
        .stdout(predicate::str::contains("Environment: production"));
}

#[test]
fn test_config_file_overrides_base_url() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("probe.yaml");
    fs::write(&path, "boh_base_url: https://boh.staging.example\n").unwrap();

    boh_probe()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("https://boh.staging.example/store-supply/demand-daily"));
}

#[test]
fn test_bad_config_file_fails() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("probe.yaml");
    fs::write(&path, "no_such_setting: true\n").unwrap();

    boh_probe()
        .args(["config", "--config"])
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Error:"));
}

// ============================================================================
// Run Command
// ============================================================================

#[cfg(not(feature = "browser"))]
#[test]
fn test_run_without_browser_feature_fails() {
    boh_probe()
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Rebuild with --features browser"));
}
