// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire types for the HTTP realization of the store operations.
//!
//! Shared by the server (axum handlers) and the client (`whirr-client`) so
//! both sides agree on field names. Submission bodies reuse
//! [`whirr_core::JobSpec`] directly; everything else is defined here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use whirr_core::{JobStatus, WorkerStatus};

/// Body of `POST /api/v1/jobs` responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub job_id: i64,
    pub run_id: String,
    pub run_dir: String,
    pub message: String,
}

/// Body of `POST /api/v1/jobs/claim`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub worker_id: String,
    pub lease_seconds: u64,
}

/// Body of `POST /api/v1/jobs/{id}/heartbeat`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatRequest {
    pub worker_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeartbeatResponse {
    pub lease_expires_at: DateTime<Utc>,
    pub cancel_requested: bool,
}

/// Body of `POST /api/v1/jobs/{id}/complete`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompleteRequest {
    pub worker_id: String,
    pub exit_code: i32,
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelResponse {
    /// Status observed before the cancel request took effect.
    pub status: JobStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelQueuedResponse {
    pub job_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryResponse {
    pub job_id: i64,
}

/// Body of `POST /api/v1/workers/register`.
///
/// `status` defaults to idle; workers reuse this endpoint to report drain
/// transitions in networked mode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegisterWorkerRequest {
    pub worker_id: String,
    pub host: String,
    pub slot: String,
    #[serde(default = "default_worker_status")]
    pub status: WorkerStatus,
    #[serde(default)]
    pub current_job_id: Option<i64>,
}

fn default_worker_status() -> WorkerStatus {
    WorkerStatus::Idle
}

/// `GET /api/v1/runs/{run_id}`: index row plus the parsed `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunDetail {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record: Option<whirr_core::RunRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

/// Error payload used on every non-2xx response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub detail: String,
}

#[cfg(test)]
#[path = "api_tests.rs"]
mod tests;
