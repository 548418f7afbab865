// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use serde_json::json;

#[test]
fn missing_file_reads_empty() {
    let dir = tempfile::tempdir().unwrap();
    let records = read_jsonl(&dir.path().join("metrics.jsonl")).unwrap();
    assert!(records.is_empty());
}

#[test]
fn append_then_read_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    for i in 0..5 {
        append_jsonl(&path, &json!({"_idx": i, "loss": 1.0 / (i + 1) as f64})).unwrap();
    }
    let records = read_jsonl(&path).unwrap();
    assert_eq!(records.len(), 5);
    for (i, record) in records.iter().enumerate() {
        assert_eq!(record["_idx"], json!(i));
    }
}

#[test]
fn truncated_final_line_is_eof() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    let mut text = String::new();
    for i in 0..999 {
        text.push_str(&format!("{{\"_idx\": {i}}}\n"));
    }
    // The 1000th record is cut mid-object, as a crashed writer would leave it.
    text.push_str("{\"_idx\": 999, \"loss\": 0.0");
    std::fs::write(&path, text).unwrap();

    let records = read_jsonl(&path).unwrap();
    assert_eq!(records.len(), 999);
    assert_eq!(records.last().unwrap()["_idx"], json!(998));
}

#[test]
fn corrupt_interior_line_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    std::fs::write(&path, "{\"_idx\": 0}\nnot json at all\n{\"_idx\": 2}\n").unwrap();
    let err = read_jsonl(&path).unwrap_err();
    assert!(matches!(err, RunDirError::CorruptRecord { line: 2, .. }));
}

#[test]
fn complete_but_invalid_final_line_is_an_error() {
    // A newline after the bad record means it was fully written, so it is
    // corruption rather than an in-flight append.
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    std::fs::write(&path, "{\"_idx\": 0}\ngarbage\n").unwrap();
    let err = read_jsonl(&path).unwrap_err();
    assert!(matches!(err, RunDirError::CorruptRecord { line: 2, .. }));
}

#[test]
fn blank_lines_are_skipped() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    std::fs::write(&path, "{\"_idx\": 0}\n\n{\"_idx\": 1}\n").unwrap();
    let records = read_jsonl(&path).unwrap();
    assert_eq!(records.len(), 2);
}

#[test]
fn idx_sequence_has_no_gaps_after_append() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("metrics.jsonl");
    for i in 0..50 {
        append_jsonl(&path, &json!({"_idx": i, "step": i * 10})).unwrap();
    }
    let records = read_jsonl(&path).unwrap();
    let idxs: Vec<i64> = records
        .iter()
        .map(|r| r["_idx"].as_i64().unwrap())
        .collect();
    assert_eq!(idxs, (0..50).collect::<Vec<i64>>());
}
