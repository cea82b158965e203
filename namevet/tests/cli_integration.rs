// namevet/tests/cli_integration.rs

//! CLI tests that need no network: argument handling, listings and
//! configuration errors.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::NamedTempFile;

fn namevet() -> Command {
    let mut cmd = Command::cargo_bin("namevet").unwrap();
    // Keep the caller's environment from leaking into the tests
    for var in ["NV_TLDS", "NV_PLATFORMS", "NV_BUDGET", "NV_PROBE_TIMEOUT", "NV_CACHE_TTL", "NV_JSON", "NV_CONFIG"] {
        cmd.env_remove(var);
    }
    cmd
}

fn create_config_file(content: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("Failed to create temp file");
    fs::write(file.path(), content).expect("Failed to write to temp file");
    file
}

#[test]
fn test_help_lists_modes() {
    namevet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--domain"))
        .stdout(predicate::str::contains("--social"))
        .stdout(predicate::str::contains("--health"))
        .stdout(predicate::str::contains("--budget"));
}

#[test]
fn test_version() {
    namevet()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_no_arguments_is_usage_error() {
    namevet()
        .assert()
        .code(1)
        .stderr(predicate::str::contains("You must specify a name"));
}

#[test]
fn test_list_platforms() {
    namevet()
        .arg("--list-platforms")
        .assert()
        .success()
        .stdout(predicate::str::contains("Instagram"))
        .stdout(predicate::str::contains("Threads"))
        .stdout(predicate::str::contains("manual check"))
        .stdout(predicate::str::contains("twitter"));
}

#[test]
fn test_list_platforms_json() {
    let output = namevet()
        .args(["--list-platforms", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let platforms: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let names: Vec<&str> = platforms
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec!["Instagram", "TikTok", "YouTube", "X", "Facebook", "LinkedIn", "Threads"]
    );
}

#[test]
fn test_list_platforms_reflects_manual_config() {
    let config = create_config_file("[engine]\nmanual_platforms = [\"LinkedIn\"]\n");
    let output = namevet()
        .args(["--list-platforms", "--json", "--config"])
        .arg(config.path())
        .output()
        .unwrap();
    assert!(output.status.success());

    let platforms: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let linkedin = platforms
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["name"] == "LinkedIn")
        .unwrap();
    assert_eq!(linkedin["strategy"]["kind"], "manual_fallback");
}

#[test]
fn test_empty_lists_do_not_block_single_checks() {
    let config = create_config_file("[defaults]\ntlds = []\nplatforms = []\n");
    namevet()
        .args(["--social", "Threads", "--handle", "acme", "--json", "--config"])
        .arg(config.path())
        .assert()
        .success();
    namevet()
        .args(["acme", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Nothing to check"));
}

#[test]
fn test_list_tlds() {
    namevet()
        .arg("--list-tlds")
        .assert()
        .success()
        .stdout(predicate::str::contains(".com"))
        .stdout(predicate::str::contains("whois.verisign-grs.com"))
        .stdout(predicate::str::contains("no RDAP"));
}

#[test]
fn test_invalid_name_exits_with_input_error() {
    namevet()
        .args(["!!!", "--json"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid name"));
}

#[test]
fn test_social_requires_handle() {
    namevet().args(["--social", "Instagram"]).assert().failure();
}

#[test]
fn test_manual_platform_needs_no_network() {
    let output = namevet()
        .args(["--social", "Threads", "--handle", "Acme", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let verdict: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(verdict["status"], "unknown");
    assert_eq!(verdict["source"], "manual_fallback");
    assert_eq!(verdict["detail"], "https://www.threads.net/@acme");
}

#[test]
fn test_combined_modes_rejected() {
    namevet()
        .args(["acme", "--domain", "acme.io"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Cannot combine"));
}

#[test]
fn test_bad_budget_rejected() {
    namevet()
        .args(["acme", "--budget", "whenever"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Invalid --budget"));
}

#[test]
fn test_missing_config_file() {
    namevet()
        .args(["acme", "--config", "/definitely/not/here/namevet.toml"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_invalid_config_file() {
    let config = create_config_file("[engine]\nprobe_timeout = \"0s\"\n");
    namevet()
        .args(["acme", "--config"])
        .arg(config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration error"));
}

#[test]
fn test_invalid_config_from_env() {
    let config = create_config_file("[rate_limits]\nper_second = 0.0\n");
    namevet()
        .arg("acme")
        .env("NV_CONFIG", config.path())
        .assert()
        .code(1)
        .stderr(predicate::str::contains("per_second"));
}
