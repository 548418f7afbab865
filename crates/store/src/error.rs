// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store errors, surfaced uniformly by both implementations.

use whirr_core::{JobStatus, SpecError};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("job {0} not found")]
    NotFound(i64),

    /// A renew/complete call from a worker that no longer owns the job
    /// (typically after its lease expired and the job was reaped). The
    /// caller must abandon the job without writing further state.
    #[error("worker '{worker_id}' does not own job {job_id}")]
    NotOwner { job_id: i64, worker_id: String },

    #[error("job {job_id} is '{status}'; only failed or cancelled jobs can be retried")]
    NotRetryable { job_id: i64, status: JobStatus },

    #[error(transparent)]
    InvalidSpec(#[from] SpecError),

    /// Transient transport or lock-timeout condition; safe to retry with
    /// backoff.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl StoreError {
    /// Transient errors the worker loop retries on its read paths.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }

    /// Stable machine-readable kind, used in HTTP error bodies.
    pub fn kind(&self) -> &'static str {
        match self {
            StoreError::NotFound(_) => "not_found",
            StoreError::NotOwner { .. } => "not_owner",
            StoreError::NotRetryable { .. } => "not_retryable",
            StoreError::InvalidSpec(_) => "invalid_spec",
            StoreError::Unavailable(_) => "unavailable",
            StoreError::Storage(_) => "storage",
        }
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            rusqlite::Error::SqliteFailure(code, _)
                if matches!(
                    code.code,
                    rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked
                ) =>
            {
                StoreError::Unavailable(e.to_string())
            }
            _ => StoreError::Storage(e.to_string()),
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match &e {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Tls(_) => StoreError::Unavailable(e.to_string()),
            _ => StoreError::Storage(e.to_string()),
        }
    }
}
