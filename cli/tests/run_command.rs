#![allow(unused_crate_dependencies)]
#![cfg(unix)]

mod common;

use common::{forkwatch, stderr, stdout};
use std::time::{Duration, Instant};

#[test]
fn test_run_reports_exit_code() {
    let output = forkwatch(&["run", "sh", "-c", "exit 3"]);
    assert_eq!(output.status.code(), Some(3));

    let out = stdout(&output);
    assert!(out.contains(": Started child PID "), "stdout: {out}");
    assert!(out.contains("exited: $? = 3"), "stdout: {out}");
}

#[test]
fn test_run_success() {
    let output = forkwatch(&["run", "true"]);
    assert!(output.status.success());
    assert!(stdout(&output).contains("exited: $? = 0"));
}

#[test]
fn test_run_missing_program_exits_127() {
    let output = forkwatch(&["run", "/definitely/not/a/real/program"]);
    assert_eq!(output.status.code(), Some(127));
    assert!(stdout(&output).contains("could not be executed"));
    assert!(stderr(&output).contains("cannot execute '/definitely/not/a/real/program'"));
}

#[test]
fn test_run_no_path_search() {
    let output = forkwatch(&["run", "--no-path-search", "true"]);
    assert_eq!(output.status.code(), Some(127));
}

#[test]
fn test_run_env_assignment() {
    let output = forkwatch(&[
        "run",
        "--env",
        "FORKWATCH_CLI=set",
        "sh",
        "-c",
        r#"test "$FORKWATCH_CLI" = set"#,
    ]);
    assert_eq!(output.status.code(), Some(0), "stdout: {}", stdout(&output));
}

#[test]
fn test_run_clear_env() {
    let output = forkwatch(&[
        "run",
        "--clear-env",
        "/bin/sh",
        "-c",
        r#"test -z "$HOME""#,
    ]);
    assert_eq!(output.status.code(), Some(0));
}

#[test]
fn test_run_rejects_malformed_env() {
    let output = forkwatch(&["run", "--env", "NOEQUALS", "true"]);
    assert!(!output.status.success());
    assert!(stdout(&output).is_empty());
}

#[test]
fn test_run_json_outcome() {
    let output = forkwatch(&["run", "--json", "sh", "-c", "exit 5"]);
    assert_eq!(output.status.code(), Some(5));

    let report: serde_json::Value =
        serde_json::from_str(stdout(&output).trim()).expect("one JSON object");
    assert_eq!(report["program"], "sh");
    assert_eq!(report["outcome"]["state"], "exited");
    assert_eq!(report["outcome"]["code"], 5);
    assert_eq!(report["exitCode"], 5);
    assert!(report["pid"].as_i64().is_some_and(|pid| pid > 0));
}

#[test]
fn test_run_timeout_kills_child() {
    let started = Instant::now();
    let output = forkwatch(&["run", "--timeout-secs", "1", "sleep", "30"]);
    assert!(started.elapsed() < Duration::from_secs(20));

    assert_eq!(output.status.code(), Some(128 + 9));
    assert!(stdout(&output).contains("signal 9"));
}

#[test]
fn test_run_timeout_returns_as_soon_as_child_exits() {
    let started = Instant::now();
    let output = forkwatch(&["run", "--timeout-secs", "30", "sh", "-c", "exit 4"]);
    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(output.status.code(), Some(4));
    assert!(stdout(&output).contains("exited: $? = 4"));
}

#[test]
fn test_run_child_exiting_at_the_deadline_is_reported_once() {
    let output = forkwatch(&[
        "run",
        "--json",
        "--timeout-secs",
        "1",
        "sh",
        "-c",
        "sleep 1; exit 7",
    ]);

    let out = stdout(&output);
    let reports: Vec<serde_json::Value> = out
        .lines()
        .map(|line| serde_json::from_str(line).expect("JSON line"))
        .collect();
    assert_eq!(reports.len(), 1, "stdout: {out}");

    // Either the child won the race or it was killed while still tracked
    let code = output.status.code();
    assert!(code == Some(7) || code == Some(128 + 9), "exit code {code:?}");
    assert_eq!(reports[0]["exitCode"].as_i64(), code.map(i64::from));
    assert!(!stderr(&output).contains("Error ["), "stderr: {}", stderr(&output));
}
