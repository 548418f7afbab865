// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command-line smoke specs for the embedded mode.

use std::path::Path;
use std::process::Output;

fn whirr(data_dir: &Path, args: &[&str]) -> Output {
    let mut cmd = assert_cmd::Command::cargo_bin("whirr").expect("whirr binary");
    cmd.arg("--data-dir")
        .arg(data_dir)
        .args(args)
        .env_remove("WHIRR_SERVER_URL")
        .env_remove("WHIRR_DATA_DIR");
    cmd.output().expect("run whirr")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn init_then_status_reports_empty_queue() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");

    let output = whirr(&data, &["init"]);
    assert!(output.status.success(), "init failed: {}", stderr(&output));

    let output = whirr(&data, &["status"]);
    assert!(output.status.success());
    let text = stdout(&output);
    assert!(text.contains("0 queued"), "unexpected status: {text}");
    assert!(text.contains("0 running"));
}

#[test]
fn commands_fail_cleanly_without_init() {
    let dir = tempfile::tempdir().unwrap();
    let output = whirr(&dir.path().join("missing"), &["status"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(
        stderr(&output).contains("not initialized"),
        "unexpected stderr: {}",
        stderr(&output)
    );
}

#[test]
fn submit_then_list_then_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    whirr(&data, &["init"]);

    let output = whirr(
        &data,
        &["submit", "--name", "smoke", "--", "/bin/echo", "hi"],
    );
    assert!(output.status.success(), "submit failed: {}", stderr(&output));
    assert!(stdout(&output).contains("job 1 queued as job-1"));

    let output = whirr(&data, &["jobs"]);
    assert!(stdout(&output).contains("queued"));
    assert!(stdout(&output).contains("smoke"));

    let output = whirr(&data, &["cancel", "1"]);
    assert!(output.status.success());

    let output = whirr(&data, &["jobs"]);
    assert!(stdout(&output).contains("no active jobs"));
}

#[test]
fn cancel_without_target_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    whirr(&data, &["init"]);
    let output = whirr(&data, &["cancel"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn retry_of_unknown_job_fails_with_exit_one() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    whirr(&data, &["init"]);
    let output = whirr(&data, &["retry", "99"]);
    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("not found"));
}
