// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for the spec suite.

use std::sync::Arc;
use std::time::Duration;

use whirr_core::{Config, JobSpec, JobStatus};
use whirr_store::{SqliteStore, Store};
use whirr_worker::{ShutdownState, Worker};

pub const SPEC_WAIT_MAX_MS: u64 = 15_000;

/// One isolated data root with an embedded store and fast intervals.
pub struct TestEnv {
    pub config: Config,
    pub store: Arc<dyn Store>,
    _dir: tempfile::TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = Config {
            data_root: dir.path().to_path_buf(),
            server_url: None,
            lease: Duration::from_secs(60),
            heartbeat: Duration::from_millis(100),
            poll_interval: Duration::from_millis(100),
            grace: Duration::from_secs(2),
            bind: whirr_core::config::DEFAULT_BIND.to_string(),
        };
        config.init().expect("init data root");
        let store = SqliteStore::open(&config.db_path()).expect("open store");
        Self {
            config,
            store: Arc::new(store),
            _dir: dir,
        }
    }

    /// Start a worker task; the returned shutdown handle drains it.
    pub fn spawn_worker(
        &self,
        slot: Option<u32>,
    ) -> (
        tokio::task::JoinHandle<Result<(), whirr_worker::WorkerError>>,
        Arc<ShutdownState>,
    ) {
        let shutdown = ShutdownState::new();
        let worker = Arc::new(Worker::new(
            Arc::clone(&self.store),
            self.config.clone(),
            slot,
            Arc::clone(&shutdown),
        ));
        let handle = tokio::spawn(async move { worker.run().await });
        (handle, shutdown)
    }

    pub async fn wait_for_status(&self, job_id: i64, wanted: JobStatus) {
        let deadline = std::time::Instant::now() + Duration::from_millis(SPEC_WAIT_MAX_MS);
        loop {
            let status = self
                .store
                .get_job(job_id)
                .await
                .expect("job must exist")
                .status;
            if status == wanted {
                return;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "job {job_id} stuck in {status}, wanted {wanted}"
            );
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }

    pub async fn drain(
        &self,
        handle: tokio::task::JoinHandle<Result<(), whirr_worker::WorkerError>>,
        shutdown: Arc<ShutdownState>,
    ) {
        shutdown.trigger();
        tokio::time::timeout(Duration::from_secs(10), handle)
            .await
            .expect("worker must drain")
            .expect("worker task")
            .expect("worker run");
    }
}

pub fn sh(cmd: &str) -> JobSpec {
    JobSpec::new(
        vec!["/bin/sh".to_string(), "-c".to_string(), cmd.to_string()],
        "/tmp",
    )
}
