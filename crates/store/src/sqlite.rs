// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Embedded single-file store.
//!
//! rusqlite in WAL mode behind a mutex. There is at most one writer at a
//! time per process, and `BEGIN IMMEDIATE` serializes claim transactions
//! across worker processes sharing the file, which is what makes the claim
//! primitive atomic. Note that WAL requires a filesystem with POSIX lock
//! semantics; shared network filesystems must use the networked store.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use tracing::debug;
use whirr_core::{
    Clock, Job, JobSpec, JobStatus, RunRecord, RunStatus, StatusCounts, SystemClock, WorkerInfo,
    WorkerStatus, SENTINEL_EXIT_CODE,
};

use crate::error::StoreError;
use crate::{apply_run_filter, Lease, RunFilter, Store};

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS jobs (
    id                  INTEGER PRIMARY KEY AUTOINCREMENT,
    name                TEXT,
    command_argv        TEXT NOT NULL,
    workdir             TEXT NOT NULL,
    tags                TEXT NOT NULL DEFAULT '[]',
    config              TEXT,
    status              TEXT NOT NULL DEFAULT 'queued',
    worker_id           TEXT,
    created_at          TEXT NOT NULL,
    started_at          TEXT,
    finished_at         TEXT,
    heartbeat_at        TEXT,
    lease_expires_at    TEXT,
    cancel_requested_at TEXT,
    exit_code           INTEGER,
    attempt             INTEGER NOT NULL DEFAULT 1,
    parent_job_id       INTEGER
);
CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at, id);

CREATE TABLE IF NOT EXISTS workers (
    id             TEXT PRIMARY KEY,
    host           TEXT NOT NULL,
    slot           TEXT NOT NULL,
    status         TEXT NOT NULL,
    current_job_id INTEGER,
    last_seen_at   TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS runs (
    run_id      TEXT PRIMARY KEY,
    job_id      INTEGER,
    name        TEXT,
    status      TEXT NOT NULL,
    tags        TEXT NOT NULL DEFAULT '[]',
    started_at  TEXT NOT NULL,
    finished_at TEXT
);
CREATE INDEX IF NOT EXISTS idx_runs_started ON runs(started_at);
";

const JOB_COLUMNS: &str = "id, name, command_argv, workdir, tags, config, status, worker_id, \
     created_at, started_at, finished_at, heartbeat_at, lease_expires_at, \
     cancel_requested_at, exit_code, attempt, parent_job_id";

/// Embedded store: `<data_root>/whirr.db`.
pub struct SqliteStore<C: Clock = SystemClock> {
    conn: Arc<Mutex<Connection>>,
    clock: C,
}

impl SqliteStore<SystemClock> {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with_clock(path, SystemClock)
    }
}

impl<C: Clock + 'static> SqliteStore<C> {
    pub fn open_with_clock(path: &Path, clock: C) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode=WAL;
             PRAGMA busy_timeout=5000;
             PRAGMA synchronous=NORMAL;
             PRAGMA foreign_keys=ON;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            clock,
        })
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }
}

/// One canonical timestamp encoding, so lexicographic SQL comparisons agree
/// with chronological order.
fn ts(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn opt_ts(t: Option<DateTime<Utc>>) -> Option<String> {
    t.map(ts)
}

fn lease_offset(lease: Duration) -> chrono::Duration {
    chrono::Duration::milliseconds(lease.as_millis() as i64)
}

fn bad_column(idx: usize, detail: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        idx,
        rusqlite::types::Type::Text,
        detail.into(),
    )
}

fn parse_ts(idx: usize, text: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| bad_column(idx, format!("bad timestamp '{text}': {e}")))
}

fn parse_opt_ts(idx: usize, text: Option<String>) -> rusqlite::Result<Option<DateTime<Utc>>> {
    text.map(|t| parse_ts(idx, t)).transpose()
}

fn parse_string_list(idx: usize, text: String) -> rusqlite::Result<Vec<String>> {
    serde_json::from_str(&text).map_err(|e| bad_column(idx, format!("bad json list: {e}")))
}

fn job_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Job> {
    let status_text: String = row.get(6)?;
    let status = JobStatus::parse(&status_text)
        .ok_or_else(|| bad_column(6, format!("bad status '{status_text}'")))?;
    let config: Option<String> = row.get(5)?;
    let config = config
        .map(|text| {
            serde_json::from_str(&text).map_err(|e| bad_column(5, format!("bad config json: {e}")))
        })
        .transpose()?;
    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        command_argv: parse_string_list(2, row.get(2)?)?,
        workdir: std::path::PathBuf::from(row.get::<_, String>(3)?),
        tags: parse_string_list(4, row.get(4)?)?,
        config,
        status,
        worker_id: row.get(7)?,
        created_at: parse_ts(8, row.get(8)?)?,
        started_at: parse_opt_ts(9, row.get(9)?)?,
        finished_at: parse_opt_ts(10, row.get(10)?)?,
        heartbeat_at: parse_opt_ts(11, row.get(11)?)?,
        lease_expires_at: parse_opt_ts(12, row.get(12)?)?,
        cancel_requested_at: parse_opt_ts(13, row.get(13)?)?,
        exit_code: row.get(14)?,
        attempt: row.get(15)?,
        parent_job_id: row.get(16)?,
    })
}

fn run_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RunRecord> {
    let status_text: String = row.get(3)?;
    let status = RunStatus::parse(&status_text)
        .ok_or_else(|| bad_column(3, format!("bad run status '{status_text}'")))?;
    Ok(RunRecord {
        run_id: row.get(0)?,
        job_id: row.get(1)?,
        name: row.get(2)?,
        status,
        tags: parse_string_list(4, row.get(4)?)?,
        started_at: parse_ts(5, row.get(5)?)?,
        finished_at: parse_opt_ts(6, row.get(6)?)?,
    })
}

fn get_job_conn(conn: &Connection, job_id: i64) -> Result<Job, StoreError> {
    conn.query_row(
        &format!("SELECT {JOB_COLUMNS} FROM jobs WHERE id = ?1"),
        params![job_id],
        job_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound(job_id))
}

fn json_list(items: &[String]) -> Result<String, StoreError> {
    serde_json::to_string(items).map_err(|e| StoreError::Storage(e.to_string()))
}

#[async_trait]
impl<C: Clock + 'static> Store for SqliteStore<C> {
    async fn enqueue(&self, spec: JobSpec) -> Result<Job, StoreError> {
        spec.validate()?;
        let now = self.now();
        let conn = self.conn.lock();
        let config_text = spec
            .config
            .as_ref()
            .map(|v| serde_json::to_string(v))
            .transpose()
            .map_err(|e| StoreError::Storage(e.to_string()))?;
        conn.execute(
            "INSERT INTO jobs (name, command_argv, workdir, tags, config, status, created_at, attempt, parent_job_id)
             VALUES (?1, ?2, ?3, ?4, ?5, 'queued', ?6, ?7, ?8)",
            params![
                spec.name,
                json_list(&spec.command_argv)?,
                spec.workdir.to_string_lossy(),
                json_list(&spec.tags)?,
                config_text,
                ts(now),
                spec.attempt,
                spec.parent_job_id,
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!(job_id = id, "enqueued job");
        get_job_conn(&conn, id)
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let now = self.now();
        let expires = now + lease_offset(lease);
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let id: Option<i64> = tx
            .query_row(
                "SELECT id FROM jobs WHERE status = 'queued' ORDER BY created_at, id LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?;
        let Some(id) = id else {
            return Ok(None);
        };

        tx.execute(
            "UPDATE jobs SET status = 'running', worker_id = ?1, started_at = ?2,
                    heartbeat_at = ?2, lease_expires_at = ?3
             WHERE id = ?4",
            params![worker_id, ts(now), ts(expires), id],
        )?;
        let job = get_job_conn(&tx, id)?;

        // Seed the run-index row; a re-claim after a reap replaces it.
        tx.execute(
            "INSERT OR REPLACE INTO runs (run_id, job_id, name, status, tags, started_at, finished_at)
             VALUES (?1, ?2, ?3, 'running', ?4, ?5, NULL)",
            params![job.run_id(), job.id, job.name, json_list(&job.tags)?, ts(now)],
        )?;
        tx.commit()?;
        debug!(job_id = id, worker_id, "claimed job");
        Ok(Some(job))
    }

    async fn renew(
        &self,
        job_id: i64,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Lease, StoreError> {
        let now = self.now();
        let expires = now + lease_offset(lease);
        let conn = self.conn.lock();
        let updated = conn.execute(
            "UPDATE jobs SET heartbeat_at = ?1, lease_expires_at = ?2
             WHERE id = ?3 AND worker_id = ?4 AND status = 'running'
               AND lease_expires_at >= ?1",
            params![ts(now), ts(expires), job_id, worker_id],
        )?;
        if updated == 0 {
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM jobs WHERE id = ?1", params![job_id], |r| {
                    r.get(0)
                })
                .optional()?;
            return Err(match exists {
                None => StoreError::NotFound(job_id),
                Some(_) => StoreError::NotOwner {
                    job_id,
                    worker_id: worker_id.to_string(),
                },
            });
        }
        let cancel_requested: Option<String> = conn.query_row(
            "SELECT cancel_requested_at FROM jobs WHERE id = ?1",
            params![job_id],
            |r| r.get(0),
        )?;
        Ok(Lease {
            expires_at: expires,
            cancel_requested: cancel_requested.is_some(),
        })
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
        let now = self.now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let updated = tx.execute(
            "UPDATE jobs SET status = ?1, finished_at = ?2, exit_code = ?3, worker_id = NULL
             WHERE id = ?4 AND worker_id = ?5 AND status = 'running'",
            params![status.as_str(), ts(now), exit_code, job_id, worker_id],
        )?;
        if updated == 0 {
            let exists: Option<i64> = tx
                .query_row("SELECT id FROM jobs WHERE id = ?1", params![job_id], |r| {
                    r.get(0)
                })
                .optional()?;
            return Err(match exists {
                None => StoreError::NotFound(job_id),
                Some(_) => StoreError::NotOwner {
                    job_id,
                    worker_id: worker_id.to_string(),
                },
            });
        }
        tx.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE job_id = ?3",
            params![status.as_str(), ts(now), job_id],
        )?;
        tx.commit()?;
        debug!(job_id, status = %status, exit_code, "completed job");
        Ok(())
    }

    async fn request_cancel(&self, job_id: i64) -> Result<JobStatus, StoreError> {
        let now = self.now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let job = get_job_conn(&tx, job_id)?;
        match job.status {
            JobStatus::Queued => {
                tx.execute(
                    "UPDATE jobs SET status = 'cancelled', finished_at = ?1, exit_code = ?2,
                            cancel_requested_at = ?1, worker_id = NULL
                     WHERE id = ?3 AND status = 'queued'",
                    params![ts(now), SENTINEL_EXIT_CODE, job_id],
                )?;
            }
            JobStatus::Running => {
                tx.execute(
                    "UPDATE jobs SET cancel_requested_at = COALESCE(cancel_requested_at, ?1)
                     WHERE id = ?2",
                    params![ts(now), job_id],
                )?;
            }
            // Terminal: nothing left to cancel.
            _ => {}
        }
        tx.commit()?;
        Ok(job.status)
    }

    async fn cancel_all_queued(&self) -> Result<Vec<i64>, StoreError> {
        let now = self.now();
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "UPDATE jobs SET status = 'cancelled', finished_at = ?1, exit_code = ?2,
                    cancel_requested_at = ?1
             WHERE status = 'queued' RETURNING id",
        )?;
        let ids = stmt
            .query_map(params![ts(now), SENTINEL_EXIT_CODE], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        Ok(ids)
    }

    async fn retry(&self, job_id: i64) -> Result<Job, StoreError> {
        let now = self.now();
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let parent = get_job_conn(&tx, job_id)?;
        if !matches!(parent.status, JobStatus::Failed | JobStatus::Cancelled) {
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
        tx.execute(
            "INSERT INTO jobs (name, command_argv, workdir, tags, config, status, created_at, attempt, parent_job_id)
             VALUES (?1, ?2, ?3, ?4, ?5, 'queued', ?6, ?7, ?8)",
            params![
                parent.name,
                json_list(&parent.command_argv)?,
                parent.workdir.to_string_lossy(),
                json_list(&parent.tags)?,
                config_text,
                ts(now),
                parent.attempt + 1,
                job_id,
            ],
        )?;
        let new_id = tx.last_insert_rowid();
        let job = get_job_conn(&tx, new_id)?;
        tx.commit()?;
        debug!(job_id = new_id, parent_job_id = job_id, "retried job");
        Ok(job)
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "UPDATE jobs SET status = 'queued', worker_id = NULL, started_at = NULL,
                    heartbeat_at = NULL, lease_expires_at = NULL, attempt = attempt + 1
             WHERE status = 'running' AND lease_expires_at < ?1 RETURNING id",
        )?;
        let ids = stmt
            .query_map(params![ts(now)], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<i64>>>()?;
        if !ids.is_empty() {
            debug!(count = ids.len(), "requeued expired jobs");
        }
        Ok(ids)
    }

    async fn get_job(&self, job_id: i64) -> Result<Job, StoreError> {
        let conn = self.conn.lock();
        get_job_conn(&conn, job_id)
    }

    async fn list_active(&self) -> Result<Vec<Job>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOB_COLUMNS} FROM jobs WHERE status IN ('queued', 'running')
             ORDER BY created_at, id"
        ))?;
        let jobs = stmt
            .query_map([], job_from_row)?
            .collect::<rusqlite::Result<Vec<Job>>>()?;
        Ok(jobs)
    }

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<RunRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT run_id, job_id, name, status, tags, started_at, finished_at
             FROM runs ORDER BY started_at DESC",
        )?;
        let records = stmt
            .query_map([], run_from_row)?
            .collect::<rusqlite::Result<Vec<RunRecord>>>()?;
        Ok(apply_run_filter(records, &filter))
    }

    async fn upsert_run(&self, record: RunRecord) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO runs (run_id, job_id, name, status, tags, started_at, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.run_id,
                record.job_id,
                record.name,
                record.status.as_str(),
                json_list(&record.tags)?,
                ts(record.started_at),
                opt_ts(record.finished_at),
            ],
        )?;
        Ok(())
    }

    async fn register_worker(&self, worker: WorkerInfo) -> Result<(), StoreError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT OR REPLACE INTO workers (id, host, slot, status, current_job_id, last_seen_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                worker.id,
                worker.host,
                worker.slot,
                worker.status.as_str(),
                worker.current_job_id,
                ts(worker.last_seen_at),
            ],
        )?;
        Ok(())
    }

    async fn update_worker(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        current_job_id: Option<i64>,
    ) -> Result<(), StoreError> {
        let now = self.now();
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE workers SET status = ?1, current_job_id = ?2, last_seen_at = ?3 WHERE id = ?4",
            params![status.as_str(), current_job_id, ts(now), worker_id],
        )?;
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, host, slot, status, current_job_id, last_seen_at FROM workers ORDER BY id",
        )?;
        let workers = stmt
            .query_map([], |row| {
                let status_text: String = row.get(3)?;
                let status = WorkerStatus::parse(&status_text)
                    .ok_or_else(|| bad_column(3, format!("bad worker status '{status_text}'")))?;
                Ok(WorkerInfo {
                    id: row.get(0)?,
                    host: row.get(1)?,
                    slot: row.get(2)?,
                    status,
                    current_job_id: row.get(4)?,
                    last_seen_at: parse_ts(5, row.get(5)?)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<WorkerInfo>>>()?;
        Ok(workers)
    }

    async fn status(&self) -> Result<StatusCounts, StoreError> {
        let conn = self.conn.lock();
        let mut counts = StatusCounts::default();
        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM jobs GROUP BY status")?;
        let rows = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?
            .collect::<rusqlite::Result<Vec<(String, i64)>>>()?;
        for (status, count) in rows {
            match status.as_str() {
                "queued" => counts.queued = count,
                "running" => counts.running = count,
                "completed" => counts.completed = count,
                "failed" => counts.failed = count,
                "cancelled" => counts.cancelled = count,
                _ => {}
            }
        }
        counts.workers_idle = conn.query_row(
            "SELECT COUNT(*) FROM workers WHERE status = 'idle'",
            [],
            |r| r.get(0),
        )?;
        counts.workers_busy = conn.query_row(
            "SELECT COUNT(*) FROM workers WHERE status = 'busy'",
            [],
            |r| r.get(0),
        )?;
        Ok(counts)
    }
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
