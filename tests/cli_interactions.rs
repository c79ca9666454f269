//! CLI options interaction tests
//!
//! These tests run the binary with argument combinations that are rejected
//! or answered before any probe touches the network.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::TempDir;

const ENV_VARS: [&str; 6] = [
    "TARGET_DOMAIN",
    "TCP_TIMEOUT_SECONDS",
    "TLS_TIMEOUT_SECONDS",
    "HTTP_TIMEOUT_SECONDS",
    "ENABLE_COLOR",
    "OUTPUT_FORMAT",
];

/// Command running in an empty directory with a clean environment
fn create_test_cmd() -> (Command, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let mut cmd = Command::cargo_bin("blockcheck").unwrap();
    cmd.current_dir(temp_dir.path());
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    (cmd, temp_dir)
}

#[test]
fn test_help_lists_options() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--tcp-timeout"))
        .stdout(predicate::str::contains("--format"))
        .stdout(predicate::str::contains("--env-help"));
}

#[test]
fn test_version() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_env_help() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.arg("--env-help")
        .assert()
        .success()
        .stdout(predicate::str::contains("TARGET_DOMAIN"))
        .stdout(predicate::str::contains("HTTP_TIMEOUT_SECONDS"));
}

#[test]
fn test_missing_domain() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Please enter a domain"));
}

#[test]
fn test_url_instead_of_hostname() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.arg("https://example.com/path")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("hostname only"));
}

#[test]
fn test_timeout_bounds() {
    for value in ["0", "61", "abc", "-1"] {
        let (mut cmd, _dir) = create_test_cmd();
        cmd.args(["example.com", "--tcp-timeout", value])
            .assert()
            .failure();
    }
}

#[test]
fn test_unknown_format() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.args(["example.com", "--format", "xml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("xml"));
}

#[test]
fn test_conflicting_color_flags() {
    let (mut cmd, _dir) = create_test_cmd();
    cmd.args(["example.com", "--color", "--no-color"])
        .assert()
        .failure();
}

#[test]
fn test_invalid_env_file_value() {
    let (mut cmd, dir) = create_test_cmd();
    fs::write(dir.path().join(".env"), "TCP_TIMEOUT_SECONDS=soon\n").unwrap();

    cmd.arg("example.com")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("TCP_TIMEOUT_SECONDS"));
}

#[test]
fn test_env_file_domain_is_validated() {
    let (mut cmd, dir) = create_test_cmd();
    fs::write(dir.path().join(".env"), "TARGET_DOMAIN=http://bad.example\n").unwrap();

    cmd.assert().failure().code(1);
}
