//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(data_dir: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_checkin"))
        .args(args)
        .env("CHECKIN_DATA_DIR", data_dir)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(data_dir: &Path, args: &[&str]) -> serde_json::Value {
    let (stdout, stderr, code) = run_cli(data_dir, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("{args:?} printed non-JSON ({e}): {stdout}"))
}

#[test]
fn test_status_when_idle() {
    let dir = tempfile::tempdir().unwrap();
    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["type"], "state_snapshot");
    assert_eq!(status["status"], "idle");
    assert_eq!(status["elapsed_secs"], 0);
}

#[test]
fn test_check_in_pause_resume_check_out() {
    let dir = tempfile::tempdir().unwrap();

    let started = run_json(dir.path(), &["timer", "start"]);
    assert_eq!(started["type"], "checked_in");
    let id = started["check_in_id"].as_str().unwrap().to_string();

    let status = run_json(dir.path(), &["timer", "status"]);
    assert_eq!(status["status"], "running");
    assert_eq!(status["check_in_id"], id.as_str());

    assert_eq!(run_json(dir.path(), &["timer", "pause"])["type"], "paused");
    assert_eq!(run_json(dir.path(), &["timer", "status"])["status"], "paused");
    assert_eq!(run_json(dir.path(), &["timer", "resume"])["type"], "resumed");

    let checked_out = run_json(dir.path(), &["timer", "checkout"]);
    assert_eq!(checked_out["type"], "checked_out");
    assert_eq!(checked_out["record"]["id"], id.as_str());
    assert_eq!(checked_out["record"]["status"], "checked-out");

    let history = run_json(dir.path(), &["history", "list", "--json"]);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["id"], id.as_str());
}

#[test]
fn test_second_start_keeps_first_session() {
    let dir = tempfile::tempdir().unwrap();
    let first = run_json(dir.path(), &["timer", "start"]);
    let second = run_json(dir.path(), &["timer", "start"]);

    assert_eq!(second["type"], "state_snapshot");
    assert_eq!(second["check_in_id"], first["check_in_id"]);
}

#[test]
fn test_reset_discards_session() {
    let dir = tempfile::tempdir().unwrap();
    run_json(dir.path(), &["timer", "start"]);
    assert_eq!(run_json(dir.path(), &["timer", "reset"])["type"], "timer_reset");
    assert_eq!(run_json(dir.path(), &["timer", "status"])["status"], "idle");

    let history = run_json(dir.path(), &["history", "list", "--json"]);
    assert!(history.as_array().unwrap().is_empty());
}

#[test]
fn test_history_export_import_and_stats() {
    let dir = tempfile::tempdir().unwrap();
    let export = dir.path().join("export.json");
    std::fs::write(
        &export,
        r#"[
            {"id":"a","startTime":"2025-03-10T08:00:00Z","duration":3600,"status":"checked-out"},
            {"id":"b","startTime":"2025-03-11T08:00:00Z","endTime":"2025-03-11T10:00:00Z","duration":7200,"status":"checked-out"}
        ]"#,
    )
    .unwrap();

    let (stdout, stderr, code) = run_cli(dir.path(), &["history", "import", export.to_str().unwrap()]);
    assert_eq!(code, 0, "{stderr}");
    assert!(stdout.contains("2 total"));

    let history = run_json(dir.path(), &["history", "list", "--json"]);
    assert_eq!(history[0]["id"], "b");
    assert_eq!(history[1]["id"], "a");

    let stats = run_json(dir.path(), &["history", "stats"]);
    assert_eq!(stats["total_sessions"], 2);
    assert_eq!(stats["total_secs"], 10_800);
    assert_eq!(stats["longest_secs"], 7_200);

    let (_, _, code) = run_cli(dir.path(), &["history", "delete", "a"]);
    assert_eq!(code, 0);
    let (_, _, code) = run_cli(dir.path(), &["history", "delete", "a"]);
    assert_ne!(code, 0);

    let (stdout, _, code) = run_cli(dir.path(), &["history", "list"]);
    assert_eq!(code, 0);
    assert!(stdout.contains("02:00:00"));
}

#[test]
fn test_config_target_and_set() {
    let dir = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(dir.path(), &["config", "get", "notifications.target_seconds"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "32400");

    let (_, _, code) = run_cli(dir.path(), &["config", "target", "0.01"]);
    assert_eq!(code, 0);
    let (stdout, _, _) = run_cli(dir.path(), &["config", "get", "notifications.target_seconds"]);
    assert_eq!(stdout.trim(), "36");

    let (_, stderr, code) = run_cli(dir.path(), &["config", "target", "25"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("at most 24"));

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "notifications.enabled", "false"]);
    assert_eq!(code, 0);
    let config = run_json(dir.path(), &["config", "list"]);
    assert_eq!(config["notifications"]["enabled"], false);

    let (_, _, code) = run_cli(dir.path(), &["config", "set", "notifications.volume", "3"]);
    assert_eq!(code, 1);
}

#[test]
fn test_unknown_command_fails() {
    let dir = tempfile::tempdir().unwrap();
    let (_, _, code) = run_cli(dir.path(), &["timer", "nonexistent"]);
    assert_ne!(code, 0);
}
