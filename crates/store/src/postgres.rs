// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Networked relational store.
//!
//! Claims are serialized by `SELECT … FOR UPDATE SKIP LOCKED`, so any number
//! of server instances (or direct connections) can pop the queue without
//! handing the same job to two workers.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use tracing::debug;
use whirr_core::{
    Job, JobSpec, JobStatus, RunRecord, RunStatus, StatusCounts, WorkerInfo, WorkerStatus,
    SENTINEL_EXIT_CODE,
};

use crate::error::StoreError;
use crate::{apply_run_filter, Lease, RunFilter, Store};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS jobs (
    id                  BIGSERIAL PRIMARY KEY,
    name                TEXT,
    command_argv        TEXT[] NOT NULL,
    workdir             TEXT NOT NULL,
    tags                TEXT[] NOT NULL DEFAULT '{}',
    config              TEXT,
    status              TEXT NOT NULL DEFAULT 'queued',
    worker_id           TEXT,
    created_at          TIMESTAMPTZ NOT NULL DEFAULT NOW(),
    started_at          TIMESTAMPTZ,
    finished_at         TIMESTAMPTZ,
    heartbeat_at        TIMESTAMPTZ,
    lease_expires_at    TIMESTAMPTZ,
    cancel_requested_at TIMESTAMPTZ,
    exit_code           INTEGER,
    attempt             BIGINT NOT NULL DEFAULT 1,
    parent_job_id       BIGINT
);
CREATE INDEX IF NOT EXISTS idx_jobs_queued ON jobs (created_at, id) WHERE status = 'queued';
CREATE INDEX IF NOT EXISTS idx_jobs_lease ON jobs (lease_expires_at) WHERE status = 'running';

CREATE TABLE IF NOT EXISTS workers (
    id             TEXT PRIMARY KEY,
    host           TEXT NOT NULL,
    slot           TEXT NOT NULL,
    status         TEXT NOT NULL,
    current_job_id BIGINT,
    last_seen_at   TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    run_id      TEXT PRIMARY KEY,
    job_id      BIGINT,
    name        TEXT,
    status      TEXT NOT NULL,
    tags        TEXT[] NOT NULL DEFAULT '{}',
    started_at  TIMESTAMPTZ NOT NULL,
    finished_at TIMESTAMPTZ
);
CREATE INDEX IF NOT EXISTS idx_runs_started ON runs (started_at DESC);
";

const JOB_COLUMNS: &str = "id, name, command_argv, workdir, tags, config, status, worker_id, \
     created_at, started_at, finished_at, heartbeat_at, lease_expires_at, \
     cancel_requested_at, exit_code, attempt, parent_job_id";

/// Networked store backed by a Postgres pool.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(url: &str) -> Result<Self, StoreError> {
        let pool = PgPool::connect(url).await?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(SCHEMA).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn job_exists(&self, job_id: i64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM jobs WHERE id = $1")
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.is_some())
    }
}

fn decode_err(detail: String) -> sqlx::Error {
    sqlx::Error::Decode(detail.into())
}

fn job_from_row(row: &PgRow) -> Result<Job, sqlx::Error> {
    let status_text: String = row.try_get("status")?;
    let status = JobStatus::parse(&status_text)
        .ok_or_else(|| decode_err(format!("bad status '{status_text}'")))?;
    let workdir: String = row.try_get("workdir")?;
    let config: Option<String> = row.try_get("config")?;
    let config = config
        .map(|text| {
            serde_json::from_str(&text)
                .map_err(|e| decode_err(format!("bad config json: {e}")))
        })
        .transpose()?;
    Ok(Job {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        command_argv: row.try_get("command_argv")?,
        workdir: workdir.into(),
        tags: row.try_get("tags")?,
        config,
        status,
        worker_id: row.try_get("worker_id")?,
        created_at: row.try_get("created_at")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
        heartbeat_at: row.try_get("heartbeat_at")?,
        lease_expires_at: row.try_get("lease_expires_at")?,
        cancel_requested_at: row.try_get("cancel_requested_at")?,
        exit_code: row.try_get("exit_code")?,
        attempt: row.try_get("attempt")?,
        parent_job_id: row.try_get("parent_job_id")?,
    })
}

fn run_from_row(row: &PgRow) -> Result<RunRecord, sqlx::Error> {
    let status_text: String = row.try_get("status")?;
    let status = RunStatus::parse(&status_text)
        .ok_or_else(|| decode_err(format!("bad run status '{status_text}'")))?;
    Ok(RunRecord {
        run_id: row.try_get("run_id")?,
        job_id: row.try_get("job_id")?,
        name: row.try_get("name")?,
        status,
        tags: row.try_get("tags")?,
        started_at: row.try_get("started_at")?,
        finished_at: row.try_get("finished_at")?,
    })
}

fn lease_offset(lease: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(lease.as_millis() as i64)
}

#[async_trait]
impl Store for PgStore {
    async fn enqueue(&self, spec: JobSpec) -> Result<Job, StoreError> {
        spec.validate()?;
        let config_text = spec
            .config
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let row = sqlx::query(&format!(
            "INSERT INTO jobs (name, command_argv, workdir, tags, config, status, created_at, attempt, parent_job_id)
             VALUES ($1, $2, $3, $4, $5, 'queued', NOW(), $6, $7)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&spec.name)
        .bind(&spec.command_argv)
        .bind(spec.workdir.to_string_lossy().into_owned())
        .bind(&spec.tags)
        .bind(config_text)
        .bind(spec.attempt)
        .bind(spec.parent_job_id)
        .fetch_one(&self.pool)
        .await?;
        let job = job_from_row(&row)?;
        debug!(job_id = job.id, "enqueued job");
        Ok(job)
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let now = Utc::now();
        let expires = now + lease_offset(lease);
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(&format!(
            "WITH claimable AS (
                 SELECT id FROM jobs
                 WHERE status = 'queued'
                 ORDER BY created_at, id
                 LIMIT 1
                 FOR UPDATE SKIP LOCKED
             )
             UPDATE jobs SET status = 'running', worker_id = $1, started_at = $2,
                    heartbeat_at = $2, lease_expires_at = $3
             WHERE id IN (SELECT id FROM claimable)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(worker_id)
        .bind(now)
        .bind(expires)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            tx.commit().await?;
            return Ok(None);
        };
        let job = job_from_row(&row)?;

        sqlx::query(
            "INSERT INTO runs (run_id, job_id, name, status, tags, started_at, finished_at)
             VALUES ($1, $2, $3, 'running', $4, $5, NULL)
             ON CONFLICT (run_id) DO UPDATE
                SET status = 'running', started_at = EXCLUDED.started_at, finished_at = NULL",
        )
        .bind(job.run_id())
        .bind(job.id)
        .bind(&job.name)
        .bind(&job.tags)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        debug!(job_id = job.id, worker_id, "claimed job");
        Ok(Some(job))
    }

    async fn renew(
        &self,
        job_id: i64,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Lease, StoreError> {
        let now = Utc::now();
        let expires = now + lease_offset(lease);
        let row = sqlx::query(
            "UPDATE jobs SET heartbeat_at = $1, lease_expires_at = $2
             WHERE id = $3 AND worker_id = $4 AND status = 'running'
               AND lease_expires_at >= $1
             RETURNING cancel_requested_at",
        )
        .bind(now)
        .bind(expires)
        .bind(job_id)
        .bind(worker_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let cancel: Option<DateTime<Utc>> = row.try_get("cancel_requested_at")?;
                Ok(Lease {
                    expires_at: expires,
                    cancel_requested: cancel.is_some(),
                })
            }
            None if self.job_exists(job_id).await? => Err(StoreError::NotOwner {
                job_id,
                worker_id: worker_id.to_string(),
            }),
            None => Err(StoreError::NotFound(job_id)),
        }
    }

    async fn complete(
        &self,
        job_id: i64,
        worker_id: &str,
        exit_code: i32,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Storage(format!(
                "complete requires a terminal status, got '{status}'"
            )));
        }
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE jobs SET status = $1, finished_at = $2, exit_code = $3, worker_id = NULL
             WHERE id = $4 AND worker_id = $5 AND status = 'running'",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(exit_code)
        .bind(job_id)
        .bind(worker_id)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            tx.rollback().await?;
            return Err(if self.job_exists(job_id).await? {
                StoreError::NotOwner {
                    job_id,
                    worker_id: worker_id.to_string(),
                }
            } else {
                StoreError::NotFound(job_id)
            });
        }
        sqlx::query("UPDATE runs SET status = $1, finished_at = $2 WHERE job_id = $3")
            .bind(status.as_str())
            .bind(now)
            .bind(job_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        debug!(job_id, status = %status, exit_code, "completed job");
        Ok(())
    }

    async fn request_cancel(&self, job_id: i64) -> Result<JobStatus, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query("SELECT status FROM jobs WHERE id = $1 FOR UPDATE")
            .bind(job_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::NotFound(job_id))?;
        let status_text: String = row.try_get("status")?;
        let status = JobStatus::parse(&status_text)
            .ok_or_else(|| StoreError::Storage(format!("bad status '{status_text}'")))?;

        match status {
            JobStatus::Queued => {
                sqlx::query(
                    "UPDATE jobs SET status = 'cancelled', finished_at = NOW(), exit_code = $1,
                            cancel_requested_at = NOW(), worker_id = NULL
                     WHERE id = $2",
                )
                .bind(SENTINEL_EXIT_CODE)
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            }
            JobStatus::Running => {
                sqlx::query(
                    "UPDATE jobs SET cancel_requested_at = COALESCE(cancel_requested_at, NOW())
                     WHERE id = $1",
                )
                .bind(job_id)
                .execute(&mut *tx)
                .await?;
            }
            // Terminal: nothing left to cancel.
            _ => {}
        }
        tx.commit().await?;
        Ok(status)
    }

    async fn cancel_all_queued(&self) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query(
            "UPDATE jobs SET status = 'cancelled', finished_at = NOW(), exit_code = $1,
                    cancel_requested_at = NOW()
             WHERE status = 'queued' RETURNING id",
        )
        .bind(SENTINEL_EXIT_CODE)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| r.try_get::<i64, _>("id").map_err(StoreError::from))
            .collect()
    }

    async fn retry(&self, job_id: i64) -> Result<Job, StoreError> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1 FOR UPDATE"
        ))
        .bind(job_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(job_id))?;
        let parent = job_from_row(&row)?;
        if !matches!(parent.status, JobStatus::Failed | JobStatus::Cancelled) {
            tx.rollback().await?;
            return Err(StoreError::NotRetryable {
                job_id,
                status: parent.status,
            });
        }
        let config_text = parent
            .config
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        let row = sqlx::query(&format!(
            "INSERT INTO jobs (name, command_argv, workdir, tags, config, status, created_at, attempt, parent_job_id)
             VALUES ($1, $2, $3, $4, $5, 'queued', NOW(), $6, $7)
             RETURNING {JOB_COLUMNS}"
        ))
        .bind(&parent.name)
        .bind(&parent.command_argv)
        .bind(parent.workdir.to_string_lossy().into_owned())
        .bind(&parent.tags)
        .bind(config_text)
        .bind(parent.attempt + 1)
        .bind(job_id)
        .fetch_one(&mut *tx)
        .await?;
        let job = job_from_row(&row)?;
        tx.commit().await?;
        debug!(job_id = job.id, parent_job_id = job_id, "retried job");
        Ok(job)
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let rows = sqlx::query(
            "UPDATE jobs SET status = 'queued', worker_id = NULL, started_at = NULL,
                    heartbeat_at = NULL, lease_expires_at = NULL, attempt = attempt + 1
             WHERE status = 'running' AND lease_expires_at < $1 RETURNING id",
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        let ids: Vec<i64> = rows
            .iter()
            .map(|r| r.try_get::<i64, _>("id"))
            .collect::<Result<_, _>>()?;
        if !ids.is_empty() {
            debug!(count = ids.len(), "requeued expired jobs");
        }
        Ok(ids)
    }

    async fn get_job(&self, job_id: i64) -> Result<Job, StoreError> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = $1"))
            .bind(job_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound(job_id))?;
        Ok(job_from_row(&row)?)
    }

    async fn list_active(&self) -> Result<Vec<Job>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status IN ('queued', 'running')
             ORDER BY created_at, id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|r| job_from_row(r).map_err(StoreError::from))
            .collect()
    }

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<RunRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT run_id, job_id, name, status, tags, started_at, finished_at
             FROM runs ORDER BY started_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        let records = rows
            .iter()
            .map(|r| run_from_row(r).map_err(StoreError::from))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(apply_run_filter(records, &filter))
    }

    async fn upsert_run(&self, record: RunRecord) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO runs (run_id, job_id, name, status, tags, started_at, finished_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (run_id) DO UPDATE
                SET job_id = EXCLUDED.job_id, name = EXCLUDED.name,
                    status = EXCLUDED.status, tags = EXCLUDED.tags,
                    started_at = EXCLUDED.started_at, finished_at = EXCLUDED.finished_at",
        )
        .bind(&record.run_id)
        .bind(record.job_id)
        .bind(&record.name)
        .bind(record.status.as_str())
        .bind(&record.tags)
        .bind(record.started_at)
        .bind(record.finished_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn register_worker(&self, worker: WorkerInfo) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO workers (id, host, slot, status, current_job_id, last_seen_at)
             VALUES ($1, $2, $3, $4, $5, $6)
             ON CONFLICT (id) DO UPDATE
                SET host = EXCLUDED.host, slot = EXCLUDED.slot,
                    status = EXCLUDED.status, current_job_id = EXCLUDED.current_job_id,
                    last_seen_at = EXCLUDED.last_seen_at",
        )
        .bind(&worker.id)
        .bind(&worker.host)
        .bind(&worker.slot)
        .bind(worker.status.as_str())
        .bind(worker.current_job_id)
        .bind(worker.last_seen_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn update_worker(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        current_job_id: Option<i64>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            "UPDATE workers SET status = $1, current_job_id = $2, last_seen_at = NOW()
             WHERE id = $3",
        )
        .bind(status.as_str())
        .bind(current_job_id)
        .bind(worker_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, host, slot, status, current_job_id, last_seen_at
             FROM workers ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| {
                let status_text: String = row.try_get("status")?;
                let status = WorkerStatus::parse(&status_text)
                    .ok_or_else(|| decode_err(format!("bad worker status '{status_text}'")))?;
                Ok(WorkerInfo {
                    id: row.try_get("id")?,
                    host: row.try_get("host")?,
                    slot: row.try_get("slot")?,
                    status,
                    current_job_id: row.try_get("current_job_id")?,
                    last_seen_at: row.try_get("last_seen_at")?,
                })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(StoreError::from)
    }

    async fn status(&self) -> Result<StatusCounts, StoreError> {
        let row = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'queued')    AS queued,
                 COUNT(*) FILTER (WHERE status = 'running')   AS running,
                 COUNT(*) FILTER (WHERE status = 'completed') AS completed,
                 COUNT(*) FILTER (WHERE status = 'failed')    AS failed,
                 COUNT(*) FILTER (WHERE status = 'cancelled') AS cancelled
             FROM jobs",
        )
        .fetch_one(&self.pool)
        .await?;
        let workers = sqlx::query(
            "SELECT
                 COUNT(*) FILTER (WHERE status = 'idle') AS idle,
                 COUNT(*) FILTER (WHERE status = 'busy') AS busy
             FROM workers",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(StatusCounts {
            queued: row.try_get("queued")?,
            running: row.try_get("running")?,
            completed: row.try_get("completed")?,
            failed: row.try_get("failed")?,
            cancelled: row.try_get("cancelled")?,
            workers_idle: workers.try_get("idle")?,
            workers_busy: workers.try_get("busy")?,
        })
    }
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
