//! Integration tests for the taskline CLI
//!
//! These tests run the actual CLI binary against a temporary config root
//! (`TASKLINE_CONFIG_DIR`) and verify output.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get the binary to test, isolated in `config_dir`
fn taskline_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("taskline").unwrap();
    cmd.env("TASKLINE_CONFIG_DIR", config_dir.path());
    cmd.env("NO_COLOR", "1");
    cmd.env_remove("RUST_LOG");
    cmd
}

const MOCK_CONNECTION: &str =
    r#"{"provider": "mock", "model": "m", "base_url": "", "api_key": ""}"#;

fn write_connection(config_dir: &TempDir, name: &str, content: &str) {
    let dir = config_dir.path().join("connections");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{name}.json")), content).unwrap();
}

#[test]
fn test_help_flag() {
    let temp_dir = TempDir::new().unwrap();
    taskline_cmd(&temp_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("config"))
        .stdout(predicate::str::contains("check"))
        .stdout(predicate::str::contains("run"));
}

// ============================================================================
// config
// ============================================================================

#[test]
fn test_config_creates_connection_file() {
    let temp_dir = TempDir::new().unwrap();

    taskline_cmd(&temp_dir)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Created connection 'default'"))
        .stdout(predicate::str::contains("default.json"));

    let path = temp_dir.path().join("connections/default.json");
    let template: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
    assert_eq!(template["provider"], "openai");
    assert_eq!(template["model"], "");
    assert_eq!(template["api_key"], "");
}

#[test]
fn test_config_named_connection_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    write_connection(&temp_dir, "work", MOCK_CONNECTION);

    taskline_cmd(&temp_dir)
        .args(["config", "-c", "work"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));

    let content = fs::read_to_string(temp_dir.path().join("connections/work.json")).unwrap();
    assert!(content.contains("\"mock\""));
}

#[test]
fn test_config_rejects_path_names() {
    let temp_dir = TempDir::new().unwrap();
    taskline_cmd(&temp_dir)
        .args(["config", "-c", "../escape"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("TL-012"));
}

// ============================================================================
// check
// ============================================================================

#[test]
fn test_check_missing_connection() {
    let temp_dir = TempDir::new().unwrap();
    taskline_cmd(&temp_dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TL-010"))
        .stderr(predicate::str::contains("taskline config"));
}

#[test]
fn test_check_template_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    taskline_cmd(&temp_dir).arg("config").assert().success();

    taskline_cmd(&temp_dir)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TL-011"));
}

#[test]
fn test_check_masks_api_key() {
    let temp_dir = TempDir::new().unwrap();
    write_connection(
        &temp_dir,
        "default",
        r#"{
            "model": "gpt-4o",
            "base_url": "https://api.openai.com/v1",
            "api_key": "sk-proj-secret"
        }"#,
    );

    taskline_cmd(&temp_dir)
        .arg("check")
        .assert()
        .success()
        .stdout(predicate::str::contains("is valid"))
        .stdout(predicate::str::contains("sk-pro***"))
        .stdout(predicate::str::contains("secret").not());
}

// ============================================================================
// run
// ============================================================================

#[test]
fn test_run_with_mock_connection() {
    let temp_dir = TempDir::new().unwrap();
    write_connection(&temp_dir, "default", MOCK_CONNECTION);

    taskline_cmd(&temp_dir)
        .arg("run")
        .write_stdin("Hello there")
        .assert()
        .success()
        .stdout(predicate::str::diff("Mock response\n"));
}

#[test]
fn test_run_prints_record() {
    let temp_dir = TempDir::new().unwrap();
    write_connection(&temp_dir, "local", MOCK_CONNECTION);

    let output = taskline_cmd(&temp_dir)
        .args(["run", "-c", "local", "--record"])
        .write_stdin("Hello there\n")
        .output()
        .unwrap();
    assert!(output.status.success());

    let record: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(record["task_name"], "cli");
    assert_eq!(record["output"], "Mock response");
    assert_eq!(record["invocation_records"][0]["input"], "Hello there");
    assert_eq!(record["invocation_records"][0]["meta"]["kind"], "llm");
}

#[test]
fn test_run_schema_rejects_text_answer() {
    let temp_dir = TempDir::new().unwrap();
    write_connection(&temp_dir, "default", MOCK_CONNECTION);
    let schema = temp_dir.path().join("schema.json");
    fs::write(&schema, r#"{"type": "object"}"#).unwrap();

    taskline_cmd(&temp_dir)
        .arg("run")
        .arg("--schema")
        .arg(&schema)
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TL-030"));
}

#[test]
fn test_run_unknown_provider() {
    let temp_dir = TempDir::new().unwrap();
    write_connection(
        &temp_dir,
        "default",
        r#"{
            "provider": "llamafarm",
            "model": "m",
            "base_url": "http://localhost",
            "api_key": "k"
        }"#,
    );

    taskline_cmd(&temp_dir)
        .arg("run")
        .write_stdin("x")
        .assert()
        .failure()
        .stderr(predicate::str::contains("TL-013"));
}
