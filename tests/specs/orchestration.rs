// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Queue/worker lifecycle specs: the scenarios a deployment relies on
//! overnight — happy path, cancellation, orphan recovery, claim exclusivity,
//! and retry chains.

use crate::prelude::*;
use std::time::Duration;
use whirr_core::JobStatus;
use whirr_runfs::RunDir;

#[tokio::test]
async fn happy_path_completes_and_records_everything() {
    let env = TestEnv::new();
    let job = env
        .store
        .enqueue(sh("echo hello; exit 0"))
        .await
        .unwrap();

    let (handle, shutdown) = env.spawn_worker(None);
    env.wait_for_status(job.id, JobStatus::Completed).await;
    env.drain(handle, shutdown).await;

    let done = env.store.get_job(job.id).await.unwrap();
    assert_eq!(done.exit_code, Some(0));
    let (started, finished) = (done.started_at.unwrap(), done.finished_at.unwrap());
    assert!(finished > started);

    let run_dir = RunDir::open(&env.config.runs_root(), &done.run_id()).unwrap();
    let log = std::fs::read_to_string(run_dir.output_log_path()).unwrap();
    assert_eq!(log, "hello\n");
    let meta = run_dir.read_meta().unwrap();
    assert_eq!(meta.status, whirr_core::RunStatus::Completed);
    assert_eq!(meta.exit_code, Some(0));
    assert!(meta.finished_at.is_some());
}

#[tokio::test]
async fn cancelling_a_running_job_terminates_it() {
    let env = TestEnv::new();
    let job = env.store.enqueue(sh("sleep 60")).await.unwrap();

    let (handle, shutdown) = env.spawn_worker(None);
    env.wait_for_status(job.id, JobStatus::Running).await;

    env.store.request_cancel(job.id).await.unwrap();
    env.wait_for_status(job.id, JobStatus::Cancelled).await;
    env.drain(handle, shutdown).await;

    let done = env.store.get_job(job.id).await.unwrap();
    assert_ne!(done.exit_code, Some(0));
    assert!(done.finished_at.is_some());
    assert!(done.worker_id.is_none());
}

#[tokio::test]
async fn orphaned_job_is_requeued_and_rerun() {
    let env = TestEnv::new();
    let job = env.store.enqueue(sh("echo recovered")).await.unwrap();

    // A worker that "died" right after claiming: the lease expires
    // immediately and nothing ever renews it.
    let claimed = env
        .store
        .claim_next("dead-host:0", Duration::ZERO)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(claimed.id, job.id);
    tokio::time::sleep(Duration::from_millis(10)).await;

    // The next worker's startup reap returns the job to the queue.
    let (handle, shutdown) = env.spawn_worker(None);
    env.wait_for_status(job.id, JobStatus::Completed).await;
    env.drain(handle, shutdown).await;

    let done = env.store.get_job(job.id).await.unwrap();
    assert_eq!(done.attempt, 2);
    assert_eq!(done.exit_code, Some(0));
}

#[tokio::test]
async fn one_job_runs_on_exactly_one_of_two_workers() {
    let env = TestEnv::new();
    let job = env.store.enqueue(sh("echo once")).await.unwrap();

    let (handle_a, shutdown_a) = env.spawn_worker(Some(0));
    let (handle_b, shutdown_b) = env.spawn_worker(Some(1));

    env.wait_for_status(job.id, JobStatus::Completed).await;
    env.drain(handle_a, shutdown_a).await;
    env.drain(handle_b, shutdown_b).await;

    // No duplicate execution: the log holds exactly one line.
    let run_dir = RunDir::open(&env.config.runs_root(), &job.run_id()).unwrap();
    let log = std::fs::read_to_string(run_dir.output_log_path()).unwrap();
    assert_eq!(log, "once\n");

    let done = env.store.get_job(job.id).await.unwrap();
    assert_eq!(done.attempt, 1, "no spurious requeue");
}

#[tokio::test]
async fn failed_job_retries_into_a_linked_chain() {
    let env = TestEnv::new();
    let spec = sh("exit 1").with_name("flaky").with_tags(vec!["chain".into()]);
    let job = env.store.enqueue(spec).await.unwrap();

    let (handle, shutdown) = env.spawn_worker(None);
    env.wait_for_status(job.id, JobStatus::Failed).await;

    let original = env.store.get_job(job.id).await.unwrap();
    assert_eq!(original.exit_code, Some(1));

    let retried = env.store.retry(job.id).await.unwrap();
    assert_eq!(retried.parent_job_id, Some(job.id));
    assert_eq!(retried.attempt, 2);
    assert_eq!(retried.command_argv, original.command_argv);
    assert_eq!(retried.workdir, original.workdir);
    assert_eq!(retried.tags, original.tags);

    env.wait_for_status(retried.id, JobStatus::Failed).await;
    env.drain(handle, shutdown).await;
}

#[tokio::test]
async fn queued_cancellation_never_reaches_a_worker() {
    let env = TestEnv::new();
    let job = env.store.enqueue(sh("echo should-not-run")).await.unwrap();
    env.store.request_cancel(job.id).await.unwrap();

    let (handle, shutdown) = env.spawn_worker(None);
    // Give the worker a few poll cycles to (not) pick it up.
    tokio::time::sleep(Duration::from_millis(500)).await;
    env.drain(handle, shutdown).await;

    let done = env.store.get_job(job.id).await.unwrap();
    assert_eq!(done.status, JobStatus::Cancelled);
    // The run directory was never created.
    assert!(!env.config.runs_root().join(done.run_id()).exists());
}
