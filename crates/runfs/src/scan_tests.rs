// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::rundir::RunDir;
use chrono::Utc;
use whirr_core::RunStatus;

#[test]
fn scan_of_missing_root_is_empty() {
    let root = tempfile::tempdir().unwrap();
    let records = scan_runs(&root.path().join("runs")).unwrap();
    assert!(records.is_empty());
}

#[test]
fn scan_rebuilds_index_rows() {
    let root = tempfile::tempdir().unwrap();
    let first = RunDir::create(root.path(), "job-1").unwrap();
    first
        .seed_meta(Some("one".into()), Vec::new(), Utc::now(), None)
        .unwrap();
    let second = RunDir::create(root.path(), "local-20260101-000000-ab12").unwrap();
    second
        .seed_meta(None, vec!["direct".into()], Utc::now() + chrono::Duration::seconds(1), None)
        .unwrap();

    let records = scan_runs(root.path()).unwrap();
    assert_eq!(records.len(), 2);
    // Newest first
    assert_eq!(records[0].run_id, "local-20260101-000000-ab12");
    assert_eq!(records[0].job_id, None);
    assert_eq!(records[1].run_id, "job-1");
    assert_eq!(records[1].job_id, Some(1));
    assert_eq!(records[1].status, RunStatus::Running);
}

#[test]
fn scan_skips_directories_without_meta() {
    let root = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(root.path().join("job-7")).unwrap();
    let good = RunDir::create(root.path(), "job-8").unwrap();
    good.seed_meta(None, Vec::new(), Utc::now(), None).unwrap();

    let records = scan_runs(root.path()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].run_id, "job-8");
}

#[test]
fn job_id_parsing() {
    assert_eq!(job_id_from_run_id("job-31"), Some(31));
    assert_eq!(job_id_from_run_id("local-20260101-000000-ab12"), None);
    assert_eq!(job_id_from_run_id("job-x"), None);
}
