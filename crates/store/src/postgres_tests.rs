// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests against a live Postgres.
//!
//! Ignored by default; run with a scratch database:
//! `WHIRR_TEST_PG_URL=postgres://localhost/whirr_test cargo test -p whirr-store -- --ignored`

use super::*;
use crate::{RunFilter, Store};

const LEASE: Duration = Duration::from_secs(60);

async fn connect() -> PgStore {
    let url = std::env::var("WHIRR_TEST_PG_URL").expect("WHIRR_TEST_PG_URL must be set");
    let store = PgStore::connect(&url).await.unwrap();
    store.migrate().await.unwrap();
    sqlx::raw_sql("TRUNCATE jobs, workers, runs RESTART IDENTITY")
        .execute(store.pool())
        .await
        .unwrap();
    store
}

fn sh(cmd: &str) -> JobSpec {
    JobSpec::new(
        vec!["/bin/sh".to_string(), "-c".to_string(), cmd.to_string()],
        "/tmp",
    )
}

#[tokio::test]
#[ignore]
async fn enqueue_claim_complete_round_trip() {
    let store = connect().await;
    let queued = store.enqueue(sh("true")).await.unwrap();
    assert_eq!(queued.status, JobStatus::Queued);

    let job = store.claim_next("h:0", LEASE).await.unwrap().unwrap();
    assert_eq!(job.id, queued.id);
    assert_eq!(job.worker_id.as_deref(), Some("h:0"));

    store
        .complete(job.id, "h:0", 0, JobStatus::Completed)
        .await
        .unwrap();
    let done = store.get_job(job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.worker_id.is_none());

    let runs = store.list_runs(RunFilter::default()).await.unwrap();
    assert_eq!(runs[0].status, RunStatus::Completed);
}

#[tokio::test]
#[ignore]
async fn concurrent_claimants_split_the_queue() {
    let store = connect().await;
    for _ in 0..4 {
        store.enqueue(sh("true")).await.unwrap();
    }

    let mut handles = Vec::new();
    for slot in 0..8 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store
                .claim_next(&format!("h:{slot}"), LEASE)
                .await
                .unwrap()
        }));
    }
    let mut claimed = Vec::new();
    for handle in handles {
        if let Some(job) = handle.await.unwrap() {
            claimed.push(job.id);
        }
    }
    claimed.sort_unstable();
    claimed.dedup();
    assert_eq!(claimed.len(), 4, "each job claimed exactly once");
}

#[tokio::test]
#[ignore]
async fn expired_lease_is_reaped_and_renew_fails() {
    let store = connect().await;
    store.enqueue(sh("sleep 30")).await.unwrap();
    let job = store
        .claim_next("h:0", Duration::from_secs(0))
        .await
        .unwrap()
        .unwrap();

    let reaped = store
        .reap_expired(Utc::now() + chrono::Duration::seconds(1))
        .await
        .unwrap();
    assert_eq!(reaped, vec![job.id]);

    let err = store.renew(job.id, "h:0", LEASE).await.unwrap_err();
    assert!(matches!(err, StoreError::NotOwner { .. }));

    let requeued = store.get_job(job.id).await.unwrap();
    assert_eq!(requeued.status, JobStatus::Queued);
    assert_eq!(requeued.attempt, 2);
}

#[tokio::test]
#[ignore]
async fn retry_links_parent() {
    let store = connect().await;
    store.enqueue(sh("exit 1")).await.unwrap();
    let job = store.claim_next("h:0", LEASE).await.unwrap().unwrap();
    store
        .complete(job.id, "h:0", 1, JobStatus::Failed)
        .await
        .unwrap();

    let retried = store.retry(job.id).await.unwrap();
    assert_eq!(retried.parent_job_id, Some(job.id));
    assert_eq!(retried.attempt, 2);
    assert_eq!(retried.command_argv, job.command_argv);
}
