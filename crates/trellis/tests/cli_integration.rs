//! CLI integration tests for the Trellis command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Argument parsing works as expected
//! - Config commands read and write `workspace.toml`
//! - Operations answer with their response code without reaching any
//!   remote service

use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const WORKSPACE_ID: &str = "3f1c8a52-5f8e-4bd0-9a43-0d6c2a1b7e90";

/// Get a command for the trellis binary, isolated from the caller's
/// environment.
fn trellis() -> Command {
    let mut cmd = Command::cargo_bin("trellis").unwrap();
    cmd.env_remove("TRELLIS_CONFIG")
        .env_remove("TRELLIS_AUTHORIZATION")
        .env_remove("TRELLIS_PERSONAL_TOKEN")
        .env_remove("TRELLIS_USERNAME");
    cmd
}

/// Write a config whose every path lives under `dir`.
fn write_config(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("workspace.toml");
    let contents = format!(
        r#"
[workspace]
id = "{id}"

[database]
path = "{root}/db"

[workflow]
installation_folder = "{root}/workflows"

[app]
installation_folder = "{root}/apps"

[logging]
dir = "{root}/logs"
"#,
        id = WORKSPACE_ID,
        root = dir.display()
    );
    std::fs::write(&path, contents).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    trellis()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Trellis"))
        .stdout(predicate::str::contains("workflows and apps"));
}

#[test]
fn test_version_displays() {
    trellis()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trellis"));
}

#[test]
fn test_help_lists_subcommands() {
    trellis()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow"))
        .stdout(predicate::str::contains("app"))
        .stdout(predicate::str::contains("deps"))
        .stdout(predicate::str::contains("update"))
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("run"));
}

#[test]
fn test_app_help_lists_operations() {
    trellis()
        .args(["app", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("install"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("stop"))
        .stdout(predicate::str::contains("uninstall"))
        .stdout(predicate::str::contains("list"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument Parsing Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_workflow_execute_requires_id() {
    trellis()
        .args(["workflow", "execute"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("<ID>"));
}

#[test]
fn test_workflow_execute_rejects_non_numeric_id() {
    trellis()
        .args(["workflow", "execute", "abc"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_malformed_param_rejected() {
    trellis()
        .args(["workflow", "execute", "42", "--param", "no-separator"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("expected name=value"));
}

#[test]
fn test_schedule_parses_without_name() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["workflow", "schedule", "42", "--start"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("UNAUTHENTICATED"));
}

#[test]
fn test_unknown_subcommand() {
    trellis().arg("prune").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Config Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workspace.toml");
    trellis()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace.toml"));
}

#[test]
fn test_config_show_reads_file() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(WORKSPACE_ID));
}

#[test]
fn test_config_set_persists() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["config", "set", "engine.version", "1.5.0"])
        .assert()
        .success();

    let contents = std::fs::read_to_string(&path).unwrap();
    assert!(contents.contains("1.5.0"));
    assert!(contents.contains(WORKSPACE_ID));
}

#[test]
fn test_config_set_without_file_fails() {
    let dir = TempDir::new().unwrap();
    trellis()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .args(["config", "set", "engine.version", "1.5.0"])
        .assert()
        .failure();
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Operation Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_uninstall_without_authorization() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["app", "uninstall", "7"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("UNAUTHENTICATED"));
}

#[test]
fn test_uninstall_unknown_app() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["--json", "app", "uninstall", "7"])
        .env("TRELLIS_AUTHORIZATION", "Bearer test-token")
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"Code\": \"ARTIFACT_NOT_FOUND\""));
}

#[test]
fn test_history_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["--json", "workflow", "history"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

#[test]
fn test_app_list_on_empty_store() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["app", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing recorded yet."));
}

#[test]
fn test_deps_check_without_manifest() {
    let dir = TempDir::new().unwrap();
    let path = write_config(dir.path());
    trellis()
        .arg("--config")
        .arg(&path)
        .args(["deps", "check"])
        .arg(dir.path().join("conda.yaml"))
        .assert()
        .success()
        .stdout(predicate::str::contains("No dependencies declared."));
}
