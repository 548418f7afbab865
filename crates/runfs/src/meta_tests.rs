// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::TimeZone;

fn fixed(secs: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 2, 1, 10, 0, secs).single().unwrap()
}

#[test]
fn seed_has_running_status_and_no_terminal_fields() {
    let meta = RunMeta::seed("job-9", Some("exp".into()), vec!["a".into()], fixed(0));
    assert_eq!(meta.status, RunStatus::Running);
    assert_eq!(meta.config_file, "config.json");
    assert!(meta.finished_at.is_none());
    assert!(meta.duration_seconds.is_none());
    assert!(meta.exit_code.is_none());
}

#[test]
fn finalize_fills_terminal_fields() {
    let mut meta = RunMeta::seed("job-9", None, Vec::new(), fixed(0));
    meta.finalize(RunStatus::Completed, 0, fixed(42));
    assert_eq!(meta.status, RunStatus::Completed);
    assert_eq!(meta.exit_code, Some(0));
    assert_eq!(meta.finished_at, Some(fixed(42)));
    assert_eq!(meta.duration_seconds, Some(42.0));
}

#[test]
fn meta_round_trips_bit_for_bit() {
    let mut meta = RunMeta::seed("job-12", Some("train".into()), vec!["lr-sweep".into()], fixed(3));
    meta.git_info = Some(GitInfo {
        commit: "abc123".into(),
        branch: "main".into(),
        dirty: true,
        remote_url: Some("git@example.com:lab/exp.git".into()),
    });
    meta.summary = Some(serde_json::json!({"best_loss": 0.03}));
    meta.finalize(RunStatus::Failed, 2, fixed(50));

    let json = serde_json::to_string_pretty(&meta).unwrap();
    let parsed: RunMeta = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, meta);

    let rewritten = serde_json::to_string_pretty(&parsed).unwrap();
    assert_eq!(rewritten, json);
}

#[test]
fn optional_fields_are_omitted_when_absent() {
    let meta = RunMeta::seed("local-20260201-100000-ab12", None, Vec::new(), fixed(0));
    let json = serde_json::to_string(&meta).unwrap();
    assert!(!json.contains("finished_at"));
    assert!(!json.contains("git_info"));
    assert!(!json.contains("exit_code"));
    assert!(!json.contains("\"name\""));
}
