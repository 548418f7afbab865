// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP realization of the store operations.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use tracing::debug;
use whirr_core::{
    local_hostname, Job, JobSpec, JobStatus, RunRecord, StatusCounts, WorkerInfo, WorkerStatus,
    DEFAULT_SLOT,
};
use whirr_store::api::{
    CancelQueuedResponse, CancelResponse, ClaimRequest, CompleteRequest, ErrorBody,
    HeartbeatRequest, HeartbeatResponse, RegisterWorkerRequest, RetryResponse, SubmitResponse,
};
use whirr_store::{Lease, RunFilter, Store, StoreError};

/// A store handle that talks to a whirr server.
///
/// Differences from the direct stores, by design of the networked mode:
/// - `reap_expired` is a no-op (the server reaps periodically);
/// - `upsert_run` is a no-op (the server maintains the index on
///   claim/complete);
/// - the heartbeat's lease length is the server's, not the caller's.
pub struct HttpStore {
    base: String,
    client: reqwest::Client,
    /// Slot this client registers under; used by worker-row updates.
    slot: Option<u32>,
}

impl HttpStore {
    pub fn new(base_url: &str) -> Self {
        Self {
            base: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            slot: None,
        }
    }

    /// A client for a worker bound to an accelerator slot.
    pub fn for_slot(base_url: &str, slot: Option<u32>) -> Self {
        Self {
            slot,
            ..Self::new(base_url)
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Check the `/health` endpoint.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let response = self
            .client
            .get(self.url("/health"))
            .send()
            .await
            .map_err(transport)?;
        expect_ok(response).await?;
        Ok(())
    }

    /// Retrieve a run's parsed metric records.
    pub async fn run_metrics(&self, run_id: &str) -> Result<Vec<serde_json::Value>, StoreError> {
        let response = self
            .client
            .get(self.url(&format!("/api/v1/runs/{run_id}/metrics")))
            .send()
            .await
            .map_err(transport)?;
        decode(expect_ok(response).await?).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let response = self
            .client
            .get(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(expect_ok(response).await?).await
    }

    async fn post_json<B: serde::Serialize, T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, StoreError> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(transport)?;
        decode(expect_ok(response).await?).await
    }

    async fn post_empty<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, StoreError> {
        let response = self
            .client
            .post(self.url(path))
            .send()
            .await
            .map_err(transport)?;
        decode(expect_ok(response).await?).await
    }
}

fn transport(e: reqwest::Error) -> StoreError {
    StoreError::Unavailable(e.to_string())
}

/// Map a non-2xx response's `{"error", "detail"}` body back onto the store's
/// error kinds. Kinds the client cannot reconstruct precisely degrade to
/// `Storage`, which is terminal for retry purposes — the safe direction.
async fn expect_ok(response: reqwest::Response) -> Result<reqwest::Response, StoreError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body: Option<ErrorBody> = response.json().await.ok();
    let (kind, detail) = match body {
        Some(body) => (body.error, body.detail),
        None => (String::from("http"), format!("http status {status}")),
    };
    Err(match kind.as_str() {
        "not_found" => StoreError::NotFound(job_id_hint(&detail)),
        "not_owner" => StoreError::NotOwner {
            job_id: job_id_hint(&detail),
            worker_id: String::new(),
        },
        "unavailable" => StoreError::Unavailable(detail),
        _ if status == StatusCode::SERVICE_UNAVAILABLE => StoreError::Unavailable(detail),
        _ => StoreError::Storage(format!("{kind}: {detail}")),
    })
}

/// Best-effort id extraction from messages like "job 42 not found".
fn job_id_hint(detail: &str) -> i64 {
    detail
        .split_whitespace()
        .find_map(|word| word.parse().ok())
        .unwrap_or(0)
}

async fn decode<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, StoreError> {
    response
        .json()
        .await
        .map_err(|e| StoreError::Storage(format!("bad response body: {e}")))
}

#[async_trait]
impl Store for HttpStore {
    async fn enqueue(&self, spec: JobSpec) -> Result<Job, StoreError> {
        spec.validate()?;
        let submitted: SubmitResponse = self.post_json("/api/v1/jobs", &spec).await?;
        debug!(job_id = submitted.job_id, "submitted job");
        self.get_job(submitted.job_id).await
    }

    async fn claim_next(
        &self,
        worker_id: &str,
        lease: Duration,
    ) -> Result<Option<Job>, StoreError> {
        let response = self
            .client
            .post(self.url("/api/v1/jobs/claim"))
            .json(&ClaimRequest {
                worker_id: worker_id.to_string(),
                lease_seconds: lease.as_secs(),
            })
            .send()
            .await
            .map_err(transport)?;
        if response.status() == StatusCode::NO_CONTENT {
            return Ok(None);
        }
        Ok(Some(decode(expect_ok(response).await?).await?))
    }

    async fn renew(
        &self,
        job_id: i64,
        worker_id: &str,
        _lease: Duration,
    ) -> Result<Lease, StoreError> {
        let response: HeartbeatResponse = self
            .post_json(
                &format!("/api/v1/jobs/{job_id}/heartbeat"),
                &HeartbeatRequest {
                    worker_id: worker_id.to_string(),
                },
            )
            .await?;
        Ok(Lease {
            expires_at: response.lease_expires_at,
            cancel_requested: response.cancel_requested,
        })
    }

    async fn complete(
        &self,
        job_id: i64,
        worker_id: &str,
        exit_code: i32,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .post_json(
                &format!("/api/v1/jobs/{job_id}/complete"),
                &CompleteRequest {
                    worker_id: worker_id.to_string(),
                    exit_code,
                    status,
                },
            )
            .await?;
        Ok(())
    }

    async fn request_cancel(&self, job_id: i64) -> Result<JobStatus, StoreError> {
        let response: CancelResponse = self
            .post_empty(&format!("/api/v1/jobs/{job_id}/cancel"))
            .await?;
        Ok(response.status)
    }

    async fn cancel_all_queued(&self) -> Result<Vec<i64>, StoreError> {
        let response: CancelQueuedResponse = self.post_empty("/api/v1/jobs/cancel-queued").await?;
        Ok(response.job_ids)
    }

    async fn retry(&self, job_id: i64) -> Result<Job, StoreError> {
        let response: RetryResponse = self
            .post_empty(&format!("/api/v1/jobs/{job_id}/retry"))
            .await?;
        self.get_job(response.job_id).await
    }

    async fn reap_expired(&self, _now: DateTime<Utc>) -> Result<Vec<i64>, StoreError> {
        // The server reaps on its own cadence in networked mode.
        Ok(Vec::new())
    }

    async fn get_job(&self, job_id: i64) -> Result<Job, StoreError> {
        self.get_json(&format!("/api/v1/jobs/{job_id}")).await
    }

    async fn list_active(&self) -> Result<Vec<Job>, StoreError> {
        self.get_json("/api/v1/jobs").await
    }

    async fn list_runs(&self, filter: RunFilter) -> Result<Vec<RunRecord>, StoreError> {
        let mut query = Vec::new();
        if let Some(status) = filter.status {
            query.push(format!("status={status}"));
        }
        if let Some(tag) = &filter.tag {
            query.push(format!("tag={tag}"));
        }
        if let Some(limit) = filter.limit {
            query.push(format!("limit={limit}"));
        }
        let path = if query.is_empty() {
            "/api/v1/runs".to_string()
        } else {
            format!("/api/v1/runs?{}", query.join("&"))
        };
        self.get_json(&path).await
    }

    async fn upsert_run(&self, _record: RunRecord) -> Result<(), StoreError> {
        // The server's claim/complete side effects keep the index current.
        Ok(())
    }

    async fn register_worker(&self, worker: WorkerInfo) -> Result<(), StoreError> {
        let _: serde_json::Value = self
            .post_json(
                "/api/v1/workers/register",
                &RegisterWorkerRequest {
                    worker_id: worker.id,
                    host: worker.host,
                    slot: worker.slot,
                    status: worker.status,
                    current_job_id: worker.current_job_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn update_worker(
        &self,
        worker_id: &str,
        status: WorkerStatus,
        current_job_id: Option<i64>,
    ) -> Result<(), StoreError> {
        // Claims and completions already update the row server-side; only
        // explicit transitions (drain to stopped) need a round trip.
        if status != WorkerStatus::Stopped {
            return Ok(());
        }
        let slot_name = self
            .slot
            .map(|s| s.to_string())
            .unwrap_or_else(|| DEFAULT_SLOT.to_string());
        let _: serde_json::Value = self
            .post_json(
                "/api/v1/workers/register",
                &RegisterWorkerRequest {
                    worker_id: worker_id.to_string(),
                    host: local_hostname(),
                    slot: slot_name,
                    status,
                    current_job_id,
                },
            )
            .await?;
        Ok(())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerInfo>, StoreError> {
        self.get_json("/api/v1/workers").await
    }

    async fn status(&self) -> Result<StatusCounts, StoreError> {
        self.get_json("/api/v1/status").await
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
