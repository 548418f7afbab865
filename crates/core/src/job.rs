// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job row and submission spec.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a job.
///
/// Transitions are strictly `queued → running → (completed|failed|cancelled)`,
/// except that a queued job may be cancelled directly. A reaped job goes back
/// to `queued` with an incremented attempt counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }

    /// Parse the lowercase wire/database form.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobStatus::Queued),
            "running" => Some(JobStatus::Running),
            "completed" => Some(JobStatus::Completed),
            "failed" => Some(JobStatus::Failed),
            "cancelled" => Some(JobStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A scheduling unit: one command to run once, on one worker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Store-assigned, monotonically increasing.
    pub id: i64,
    pub name: Option<String>,
    /// Program and literal arguments. Executed as-is, no shell interpretation.
    pub command_argv: Vec<String>,
    /// Absolute path; the child's working directory.
    pub workdir: PathBuf,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form user configuration, copied into the run's `config.json`
    /// when the job is claimed.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    pub status: JobStatus,
    /// Set while claimed; cleared on terminal transition and on reap.
    pub worker_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub heartbeat_at: Option<DateTime<Utc>>,
    pub lease_expires_at: Option<DateTime<Utc>>,
    pub cancel_requested_at: Option<DateTime<Utc>>,
    pub exit_code: Option<i32>,
    /// 1 for an original submission; incremented by retries and reaps.
    pub attempt: i64,
    /// Links a retry to the job it was retried from.
    pub parent_job_id: Option<i64>,
}

impl Job {
    /// Derived run identifier for queued jobs: `job-<id>`.
    pub fn run_id(&self) -> String {
        crate::run::run_id_for_job(self.id)
    }
}

/// Exit code recorded when no child process produced one (startup failure,
/// cancellation before launch, signal death without a code).
pub const SENTINEL_EXIT_CODE: i32 = -1;

/// What a caller submits. The store assigns the id and timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobSpec {
    pub command_argv: Vec<String>,
    pub workdir: PathBuf,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form user configuration, written to the run's `config.json`.
    #[serde(default)]
    pub config: Option<serde_json::Value>,
    #[serde(default)]
    pub parent_job_id: Option<i64>,
    #[serde(default = "default_attempt")]
    pub attempt: i64,
}

fn default_attempt() -> i64 {
    1
}

impl JobSpec {
    pub fn new(command_argv: Vec<String>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            command_argv,
            workdir: workdir.into(),
            name: None,
            tags: Vec::new(),
            config: None,
            parent_job_id: None,
            attempt: 1,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Validate what can be checked without touching the filesystem.
    ///
    /// Whether the workdir actually exists is a launch-time question (the
    /// supervisor turns a missing directory into a failed run); an empty argv
    /// or a relative workdir is rejected up front.
    pub fn validate(&self) -> Result<(), SpecError> {
        if self.command_argv.is_empty() {
            return Err(SpecError::EmptyCommand);
        }
        if !self.workdir.is_absolute() {
            return Err(SpecError::RelativeWorkdir(self.workdir.clone()));
        }
        if self.attempt < 1 {
            return Err(SpecError::BadAttempt(self.attempt));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SpecError {
    #[error("command_argv must not be empty")]
    EmptyCommand,

    #[error("workdir must be an absolute path, got {0}")]
    RelativeWorkdir(PathBuf),

    #[error("attempt must be >= 1, got {0}")]
    BadAttempt(i64),
}

#[cfg(test)]
#[path = "job_tests.rs"]
mod tests;
