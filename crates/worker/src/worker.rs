// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker loop: reap, register, then claim → supervise → finalize.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{info, warn};
use whirr_core::{
    derive_worker_id, local_hostname, Config, Job, RunStatus, WorkerInfo, WorkerStatus,
    DEFAULT_SLOT,
};
use whirr_runfs::{capture_git_info, RunDir};
use whirr_store::{Store, StoreError};

use crate::backoff::Backoff;
use crate::error::WorkerError;
use crate::signals::ShutdownState;
use crate::supervisor::{Supervisor, SupervisorConfig};

/// A long-lived worker process, one per accelerator slot.
pub struct Worker {
    store: Arc<dyn Store>,
    config: Config,
    shutdown: Arc<ShutdownState>,
    worker_id: String,
    slot: Option<u32>,
}

impl Worker {
    pub fn new(
        store: Arc<dyn Store>,
        config: Config,
        slot: Option<u32>,
        shutdown: Arc<ShutdownState>,
    ) -> Self {
        Self {
            store,
            config,
            shutdown,
            worker_id: derive_worker_id(slot),
            slot,
        }
    }

    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    /// Run until drained or forced.
    pub async fn run(&self) -> Result<(), WorkerError> {
        // A new worker is the queue's chance to recover orphans.
        let reaped = self.store.reap_expired(Utc::now()).await?;
        for job_id in &reaped {
            info!(job_id, "requeued job with expired lease");
        }

        let slot_name = self
            .slot
            .map(|s| s.to_string())
            .unwrap_or_else(|| DEFAULT_SLOT.to_string());
        self.store
            .register_worker(WorkerInfo::new(local_hostname(), slot_name, Utc::now()))
            .await?;
        info!(worker_id = %self.worker_id, "worker ready");

        let mut backoff = Backoff::for_store();
        loop {
            if self.shutdown.draining() {
                break;
            }
            let claimed = match self
                .store
                .claim_next(&self.worker_id, self.config.lease)
                .await
            {
                Ok(claimed) => {
                    backoff.reset();
                    claimed
                }
                Err(e) if e.is_transient() => match backoff.next_delay() {
                    Some(delay) => {
                        warn!(error = %e, "claim failed; backing off");
                        self.sleep(delay).await;
                        continue;
                    }
                    None => return Err(e.into()),
                },
                Err(e) => return Err(e.into()),
            };
            let Some(job) = claimed else {
                self.sleep(self.config.poll_interval).await;
                continue;
            };

            self.store
                .update_worker(&self.worker_id, WorkerStatus::Busy, Some(job.id))
                .await?;
            self.execute(&job).await?;
            self.store
                .update_worker(&self.worker_id, WorkerStatus::Idle, None)
                .await?;
        }

        // Best effort: a crash here just leaves a stale row for the reaper.
        let _ = self
            .store
            .update_worker(&self.worker_id, WorkerStatus::Stopped, None)
            .await;
        info!(worker_id = %self.worker_id, "worker stopped");
        Ok(())
    }

    /// Build the run directory, supervise the child, finalize both sinks.
    async fn execute(&self, job: &Job) -> Result<(), WorkerError> {
        let run_dir = RunDir::create(&self.config.runs_root(), &job.run_id())?;
        if let Some(config) = &job.config {
            run_dir.write_config(config)?;
        }
        let git_info = capture_git_info(&job.workdir);
        run_dir.seed_meta(
            job.name.clone(),
            job.tags.clone(),
            job.started_at.unwrap_or_else(Utc::now),
            git_info,
        )?;

        let supervisor = Supervisor::new(
            Arc::clone(&self.store),
            Arc::clone(&self.shutdown),
            SupervisorConfig {
                worker_id: self.worker_id.clone(),
                heartbeat: self.config.heartbeat,
                lease: self.config.lease,
                grace: self.config.grace,
                slot: self.slot,
            },
        );

        match supervisor.run(job, &run_dir).await {
            Ok(outcome) => {
                // Run directory first; a corrupt meta.json here is fatal by
                // policy and stops the worker before it can do more damage.
                run_dir.finalize_meta(
                    RunStatus::from(outcome.status),
                    outcome.exit_code,
                    Utc::now(),
                )?;
                match self
                    .store
                    .complete(job.id, &self.worker_id, outcome.exit_code, outcome.status)
                    .await
                {
                    Ok(()) => {}
                    Err(StoreError::NotOwner { .. }) => {
                        warn!(job_id = job.id, "job re-owned before completion; result dropped");
                    }
                    Err(e) => return Err(e.into()),
                }
                info!(
                    job_id = job.id,
                    status = %outcome.status,
                    exit_code = outcome.exit_code,
                    "job finished"
                );
                Ok(())
            }
            Err(WorkerError::LeaseLost(job_id)) => {
                warn!(job_id, "lease lost during supervision; job abandoned");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Sleep that wakes early when the shutdown stage advances.
    async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = tokio::time::sleep(duration) => {}
            _ = self.shutdown.changed() => {}
        }
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
