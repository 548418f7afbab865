// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run identifiers and the thin run-index row.
//!
//! The filesystem is authoritative for run data; the index row exists so that
//! listing runs does not require a directory scan, and it is rebuildable from
//! the run directories at any time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::clock::Clock;

/// Status of a run as recorded in `meta.json` and the run index.
///
/// Unlike [`crate::JobStatus`] there is no `queued`: a run only exists once
/// something started executing (or a direct-mode script initialized it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl RunStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RunStatus::Running)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "running" => Some(RunStatus::Running),
            "completed" => Some(RunStatus::Completed),
            "failed" => Some(RunStatus::Failed),
            "cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<crate::JobStatus> for RunStatus {
    fn from(s: crate::JobStatus) -> Self {
        match s {
            // A queued job has no run yet; callers only convert once running.
            crate::JobStatus::Queued | crate::JobStatus::Running => RunStatus::Running,
            crate::JobStatus::Completed => RunStatus::Completed,
            crate::JobStatus::Failed => RunStatus::Failed,
            crate::JobStatus::Cancelled => RunStatus::Cancelled,
        }
    }
}

/// Thin index row for one run. Rebuildable from `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: String,
    /// None for direct-mode runs created outside the queue.
    pub job_id: Option<i64>,
    pub name: Option<String>,
    pub status: RunStatus,
    #[serde(default)]
    pub tags: Vec<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Job/worker counts returned by the status operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub queued: i64,
    pub running: i64,
    pub completed: i64,
    pub failed: i64,
    pub cancelled: i64,
    pub workers_idle: i64,
    pub workers_busy: i64,
}

/// Run id for a queued job: `job-<id>`, decimal, no padding.
pub fn run_id_for_job(job_id: i64) -> String {
    format!("job-{job_id}")
}

const HEX: [char; 16] = [
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'a', 'b', 'c', 'd', 'e', 'f',
];

/// Run id for a direct-mode run: `local-<YYYYMMDD-HHMMSS>-<4 hex>` in UTC.
pub fn new_local_run_id(clock: &impl Clock) -> String {
    let stamp = clock.now_utc().format("%Y%m%d-%H%M%S");
    let suffix = nanoid::nanoid!(4, &HEX);
    format!("local-{stamp}-{suffix}")
}

#[cfg(test)]
#[path = "run_tests.rs"]
mod tests;
