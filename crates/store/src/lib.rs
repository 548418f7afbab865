// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! whirr-store: the transactional queue behind the scheduling contract.
//!
//! Two implementations of one [`Store`] trait:
//!
//! - [`SqliteStore`] — embedded single-host mode. One file, WAL journal,
//!   claims serialized by an exclusive (`BEGIN IMMEDIATE`) transaction.
//! - [`PgStore`] — networked mode. Claims serialized by
//!   `SELECT … FOR UPDATE SKIP LOCKED`.
//!
//! They differ in exactly those locking mechanisms and in who runs the
//! reaper (worker startup vs. a periodic server task); every other behavior,
//! including the `NotOwner` surface, is identical.

pub mod api;
mod error;
mod postgres;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use whirr_core::{Job, JobSpec, JobStatus, RunRecord, RunStatus, StatusCounts, WorkerInfo, WorkerStatus};

pub use error::StoreError;
pub use postgres::PgStore;
pub use sqlite::SqliteStore;

/// What a successful renewal grants.
///
/// `cancel_requested` rides along so the owning worker learns about
/// cancellation on the renewal path, without a second round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lease {
    pub expires_at: DateTime<Utc>,
    pub cancel_requested: bool,
}

/// Filters for run-index listings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunFilter {
    pub status: Option<RunStatus>,
    pub tag: Option<String>,
    pub limit: Option<usize>,
}

/// The scheduling contract shared by the embedded and networked stores
/// (and by the HTTP client that fronts the networked one).
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new queued job. Fails on an invalid spec.
    async fn enqueue(&self, spec: JobSpec) -> Result<Job, StoreError>;

    /// Atomically claim the oldest queued job for `worker_id`, moving it to
    /// `running` with a fresh lease. Empty queue is not an error.
    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError>;

    /// Extend the lease of a running job this worker owns.
    ///
    /// `NotOwner` when the job is not running under `worker_id` any more —
    /// including when the previous lease already expired.
    async fn renew(
        &self,
        job_id: i64,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Lease, StoreError>;

    /// Record the terminal transition for a job this worker owns.
    async fn complete(
        &self,
        job_id: i64,
        worker_id: &str,
        exit_code: i32,
        status: JobStatus,
    ) -> Result<(), StoreError>;

    /// Request cancellation. Queued jobs cancel synchronously; running jobs
    /// get `cancel_requested_at` set for the owning worker to observe.
    /// Returns the status observed *before* the call. Idempotent.
    async fn request_cancel(&self, job_id: i64) -> Result<JobStatus, StoreError>;

    /// Cancel every queued job; returns their ids.
    async fn cancel_all_queued(&self) -> Result<Vec<i64>, StoreError>;

    /// Resubmit a failed or cancelled job. The new job copies the command,
    /// workdir, name and tags, links back via `parent_job_id`, and carries
    /// `attempt = parent.attempt + 1`.
    async fn retry(&self, job_id: i64) -> Result<Job, StoreError>;

    /// Requeue every running job whose lease expired before `now`,
    /// incrementing its attempt. Returns the requeued ids. Idempotent.
    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError>;

    async fn get_job(&self, job_id: i64) -> Result<Job, StoreError>;

    /// Queued and running jobs, FIFO over `(created_at, id)`.
    async fn list_active(&self) -> Result<Vec<Job>, StoreError>;

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<RunRecord>, StoreError>;

    /// Insert or replace one run-index row.
    async fn upsert_run(&self, record: RunRecord) -> Result<(), StoreError>;

    async fn register_worker(&self, worker: WorkerInfo) -> Result<(), StoreError>;

    /// Update a worker's status/current job, refreshing `last_seen_at`.
    async fn update_worker(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        current_job_id: Option<i64>,
    ) -> Result<(), StoreError>;

    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, StoreError>;

    /// Job counts by status plus idle/busy worker counts.
    async fn status(&self) -> Result<StatusCounts, StoreError>;
}

/// Apply a [`RunFilter`] in memory. Both stores keep run rows small enough
/// that filtering after the indexed fetch is the simple, correct choice.
pub(crate) fn apply_run_filter(records: Vec<RunRecord>, filter: &RunFilter) -> Vec<RunRecord> {
    let mut out: Vec<RunRecord> = records
        .into_iter()
        .filter(|r| filter.status.is_none_or(|s| r.status == s))
        .filter(|r| {
            filter
                .tag
                .as_ref()
                .is_none_or(|t| r.tags.iter().any(|have| have == t))
        })
        .collect();
    if let Some(limit) = filter.limit {
        out.truncate(limit);
    }
    out
}
