// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `/api/v1` handlers.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::warn;
use whirr_core::{Job, JobSpec, RunStatus, StatusCounts, WorkerInfo, WorkerStatus};
use whirr_runfs::{ArtifactEntry, RunDir};
use whirr_store::api::{
    CancelQueuedResponse, CancelResponse, ClaimRequest, CompleteRequest, HeartbeatRequest,
    HeartbeatResponse, RegisterWorkerRequest, RetryResponse, RunDetail, SubmitResponse,
};
use whirr_store::RunFilter;

use crate::app::AppState;
use crate::error::ServerError;

pub(crate) async fn health() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

pub(crate) async fn status(
    State(state): State<AppState>,
) -> Result<Json<StatusCounts>, ServerError> {
    Ok(Json(state.store.status().await?))
}

pub(crate) async fn submit(
    State(state): State<AppState>,
    Json(spec): Json<JobSpec>,
) -> Result<Json<SubmitResponse>, ServerError> {
    let job = state.store.enqueue(spec).await?;
    let run_id = job.run_id();
    Ok(Json(SubmitResponse {
        job_id: job.id,
        run_dir: state.runs_root.join(&run_id).display().to_string(),
        run_id,
        message: format!("job {} queued", job.id),
    }))
}

pub(crate) async fn list_active(
    State(state): State<AppState>,
) -> Result<Json<Vec<Job>>, ServerError> {
    Ok(Json(state.store.list_active().await?))
}

pub(crate) async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<Job>, ServerError> {
    Ok(Json(state.store.get_job(id).await?))
}

pub(crate) async fn claim(
    State(state): State<AppState>,
    Json(req): Json<ClaimRequest>,
) -> Result<Response, ServerError> {
    let lease = std::time::Duration::from_secs(req.lease_seconds);
    match state.store.claim_next(&req.worker_id, lease).await? {
        Some(job) => {
            // Worker-row maintenance is a server-side effect in networked
            // mode; workers only talk about jobs.
            if let Err(e) = state
                .store
                .update_worker(&req.worker_id, WorkerStatus::Busy, Some(job.id))
                .await
            {
                warn!(worker_id = %req.worker_id, error = %e, "worker row update failed");
            }
            Ok(Json(job).into_response())
        }
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

pub(crate) async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, ServerError> {
    let lease = state.store.renew(id, &req.worker_id, state.lease).await?;
    if let Err(e) = state
        .store
        .update_worker(&req.worker_id, WorkerStatus::Busy, Some(id))
        .await
    {
        warn!(worker_id = %req.worker_id, error = %e, "worker row update failed");
    }
    Ok(Json(HeartbeatResponse {
        lease_expires_at: lease.expires_at,
        cancel_requested: lease.cancel_requested,
    }))
}

pub(crate) async fn complete(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(req): Json<CompleteRequest>,
) -> Result<Json<Value>, ServerError> {
    state
        .store
        .complete(id, &req.worker_id, req.exit_code, req.status)
        .await?;
    if let Err(e) = state
        .store
        .update_worker(&req.worker_id, WorkerStatus::Idle, None)
        .await
    {
        warn!(worker_id = %req.worker_id, error = %e, "worker row update failed");
    }
    Ok(Json(json!({})))
}

pub(crate) async fn cancel(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<CancelResponse>, ServerError> {
    let status = state.store.request_cancel(id).await?;
    Ok(Json(CancelResponse { status }))
}

pub(crate) async fn cancel_queued(
    State(state): State<AppState>,
) -> Result<Json<CancelQueuedResponse>, ServerError> {
    let job_ids = state.store.cancel_all_queued().await?;
    Ok(Json(CancelQueuedResponse { job_ids }))
}

pub(crate) async fn retry(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<RetryResponse>, ServerError> {
    let job = state.store.retry(id).await?;
    Ok(Json(RetryResponse { job_id: job.id }))
}

pub(crate) async fn register_worker(
    State(state): State<AppState>,
    Json(req): Json<RegisterWorkerRequest>,
) -> Result<Json<Value>, ServerError> {
    state
        .store
        .register_worker(WorkerInfo {
            id: req.worker_id,
            host: req.host,
            slot: req.slot,
            status: req.status,
            current_job_id: req.current_job_id,
            last_seen_at: Utc::now(),
        })
        .await?;
    Ok(Json(json!({})))
}

pub(crate) async fn list_workers(
    State(state): State<AppState>,
) -> Result<Json<Vec<WorkerInfo>>, ServerError> {
    Ok(Json(state.store.list_workers().await?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct RunsQuery {
    status: Option<String>,
    tag: Option<String>,
    limit: Option<usize>,
}

pub(crate) async fn list_runs(
    State(state): State<AppState>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<Vec<whirr_core::RunRecord>>, ServerError> {
    let status = query
        .status
        .map(|text| {
            RunStatus::parse(&text)
                .ok_or_else(|| ServerError::BadRequest(format!("unknown status '{text}'")))
        })
        .transpose()?;
    let filter = RunFilter {
        status,
        tag: query.tag,
        limit: query.limit,
    };
    Ok(Json(state.store.list_runs(filter).await?))
}

pub(crate) async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<RunDetail>, ServerError> {
    let record = state
        .store
        .list_runs(RunFilter::default())
        .await?
        .into_iter()
        .find(|r| r.run_id == run_id);
    let meta = RunDir::open(&state.runs_root, &run_id)
        .and_then(|dir| dir.read_meta())
        .ok()
        .map(|meta| serde_json::to_value(meta).unwrap_or(Value::Null));
    if record.is_none() && meta.is_none() {
        return Err(whirr_runfs::RunDirError::NotFound(run_id).into());
    }
    Ok(Json(RunDetail { record, meta }))
}

pub(crate) async fn run_metrics(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<Value>>, ServerError> {
    let dir = RunDir::open(&state.runs_root, &run_id)?;
    Ok(Json(dir.read_metrics()?))
}

pub(crate) async fn list_artifacts(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Json<Vec<ArtifactEntry>>, ServerError> {
    let dir = RunDir::open(&state.runs_root, &run_id)?;
    Ok(Json(dir.list_artifacts()?))
}

pub(crate) async fn read_artifact(
    State(state): State<AppState>,
    Path((run_id, path)): Path<(String, String)>,
) -> Result<Response, ServerError> {
    let dir = RunDir::open(&state.runs_root, &run_id)?;
    let full = dir.artifact_path(&path)?;
    let bytes = tokio::fs::read(&full).await.map_err(|e| {
        ServerError::RunDir(whirr_runfs::RunDirError::Io {
            path: full.clone(),
            source: e,
        })
    })?;
    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
