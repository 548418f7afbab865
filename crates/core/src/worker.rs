// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker identity and registration record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Slot name used when no accelerator index was assigned.
pub const DEFAULT_SLOT: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerStatus {
    Idle,
    Busy,
    Stopped,
}

impl WorkerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkerStatus::Idle => "idle",
            WorkerStatus::Busy => "busy",
            WorkerStatus::Stopped => "stopped",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(WorkerStatus::Idle),
            "busy" => Some(WorkerStatus::Busy),
            "stopped" => Some(WorkerStatus::Stopped),
            _ => None,
        }
    }
}

impl std::fmt::Display for WorkerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Registration record for one worker process.
///
/// A crash leaves the record `busy` with a stale `last_seen_at`; that staleness
/// is the orphan-reaping signal, not an error in itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerInfo {
    /// `<host>:<slot>` where slot is the accelerator index or `default`.
    pub id: String,
    pub host: String,
    pub slot: String,
    pub status: WorkerStatus,
    pub current_job_id: Option<i64>,
    pub last_seen_at: DateTime<Utc>,
}

impl WorkerInfo {
    pub fn new(host: impl Into<String>, slot: impl Into<String>, now: DateTime<Utc>) -> Self {
        let host = host.into();
        let slot = slot.into();
        Self {
            id: format!("{host}:{slot}"),
            host,
            slot,
            status: WorkerStatus::Idle,
            current_job_id: None,
            last_seen_at: now,
        }
    }
}

/// This machine's hostname, falling back to `localhost` when unreadable.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "localhost".to_string())
}

/// Derive this host's worker id: `<hostname>:<slot>`.
pub fn derive_worker_id(slot: Option<u32>) -> String {
    match slot {
        Some(idx) => format!("{}:{idx}", local_hostname()),
        None => format!("{}:{DEFAULT_SLOT}", local_hostname()),
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
