// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;
use whirr_core::JobStatus;
use whirr_runfs::RunDir;
use whirr_store::SqliteStore;

fn test_state(dir: &tempfile::TempDir) -> AppState {
    let store = SqliteStore::open(&dir.path().join("whirr.db")).unwrap();
    AppState {
        store: Arc::new(store),
        runs_root: dir.path().join("runs"),
        lease: Duration::from_secs(60),
    }
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = match body {
        Some(body) => Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap(),
    };
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

fn submit_body() -> Value {
    json!({
        "command_argv": ["/bin/sh", "-c", "echo hi"],
        "workdir": "/tmp",
        "name": "smoke",
        "tags": ["api"],
    })
}

#[tokio::test]
async fn health_reports_healthy() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (status, body) = send(&router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "healthy"}));
}

#[tokio::test]
async fn submit_claim_heartbeat_complete_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));

    let (status, submitted) = send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;
    assert_eq!(status, StatusCode::OK);
    let job_id = submitted["job_id"].as_i64().unwrap();
    assert_eq!(submitted["run_id"], format!("job-{job_id}"));
    assert!(submitted["run_dir"].as_str().unwrap().ends_with(&format!("runs/job-{job_id}")));

    let (status, job) = send(
        &router,
        "POST",
        "/api/v1/jobs/claim",
        Some(json!({"worker_id": "h:0", "lease_seconds": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["id"].as_i64(), Some(job_id));
    assert_eq!(job["status"], "running");

    let (status, lease) = send(
        &router,
        "POST",
        &format!("/api/v1/jobs/{job_id}/heartbeat"),
        Some(json!({"worker_id": "h:0"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(lease["cancel_requested"], json!(false));
    assert!(lease["lease_expires_at"].is_string());

    let (status, _) = send(
        &router,
        "POST",
        &format!("/api/v1/jobs/{job_id}/complete"),
        Some(json!({"worker_id": "h:0", "exit_code": 0, "status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, job) = send(&router, "GET", &format!("/api/v1/jobs/{job_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(job["status"], "completed");
    assert_eq!(job["exit_code"], json!(0));

    // The server maintained the worker row as a side effect of claiming.
    let (status, workers) = send(&router, "GET", "/api/v1/workers", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(workers.as_array().unwrap().len(), 1);
    assert_eq!(workers[0]["status"], "idle");
}

#[tokio::test]
async fn claim_on_empty_queue_returns_no_content() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (status, _) = send(
        &router,
        "POST",
        "/api/v1/jobs/claim",
        Some(json!({"worker_id": "h:0", "lease_seconds": 60})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn missing_job_yields_error_body() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (status, body) = send(&router, "GET", "/api/v1/jobs/999", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
    assert!(body["detail"].as_str().unwrap().contains("999"));
}

#[tokio::test]
async fn heartbeat_from_wrong_worker_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;
    let (_, job) = send(
        &router,
        "POST",
        "/api/v1/jobs/claim",
        Some(json!({"worker_id": "h:0", "lease_seconds": 60})),
    )
    .await;
    let job_id = job["id"].as_i64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/jobs/{job_id}/heartbeat"),
        Some(json!({"worker_id": "impostor:0"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_owner");
}

#[tokio::test]
async fn cancel_queued_job_and_retry_it() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (_, submitted) = send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;
    let job_id = submitted["job_id"].as_i64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/jobs/{job_id}/cancel"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "queued");

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/jobs/{job_id}/retry"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let retry_id = body["job_id"].as_i64().unwrap();
    assert_ne!(retry_id, job_id);

    let (_, retried) = send(&router, "GET", &format!("/api/v1/jobs/{retry_id}"), None).await;
    assert_eq!(retried["parent_job_id"].as_i64(), Some(job_id));
    assert_eq!(retried["attempt"].as_i64(), Some(2));
}

#[tokio::test]
async fn retry_of_nonterminal_job_conflicts() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (_, submitted) = send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;
    let job_id = submitted["job_id"].as_i64().unwrap();

    let (status, body) = send(
        &router,
        "POST",
        &format!("/api/v1/jobs/{job_id}/retry"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "not_retryable");
}

#[tokio::test]
async fn cancel_all_queued_reports_ids() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (_, a) = send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;
    let (_, b) = send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;

    let (status, body) = send(&router, "POST", "/api/v1/jobs/cancel-queued", None).await;
    assert_eq!(status, StatusCode::OK);
    let mut ids: Vec<i64> = body["job_ids"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_i64().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(
        ids,
        vec![a["job_id"].as_i64().unwrap(), b["job_id"].as_i64().unwrap()]
    );
}

#[tokio::test]
async fn run_endpoints_read_the_filesystem() {
    let dir = tempfile::tempdir().unwrap();
    let state = test_state(&dir);
    let router = build_router(state.clone());

    // A finished run on disk, with metrics and one artifact.
    let run_dir = RunDir::create(&state.runs_root, "job-1").unwrap();
    run_dir
        .seed_meta(Some("fit".into()), vec!["api".into()], Utc::now(), None)
        .unwrap();
    for i in 0..3 {
        whirr_runfs::append_jsonl(&run_dir.metrics_path(), &json!({"_idx": i, "loss": 0.5}))
            .unwrap();
    }
    std::fs::create_dir_all(run_dir.artifacts_dir()).unwrap();
    std::fs::write(run_dir.artifacts_dir().join("model.bin"), b"weights").unwrap();

    let (status, detail) = send(&router, "GET", "/api/v1/runs/job-1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(detail["meta"]["run_id"], "job-1");
    assert_eq!(detail["meta"]["status"], "running");

    let (status, metrics) = send(&router, "GET", "/api/v1/runs/job-1/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(metrics.as_array().unwrap().len(), 3);

    let (status, artifacts) = send(&router, "GET", "/api/v1/runs/job-1/artifacts", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(artifacts[0]["path"], "model.bin");
    assert_eq!(artifacts[0]["size"], json!(7));

    let request = Request::builder()
        .method("GET")
        .uri("/api/v1/runs/job-1/artifacts/model.bin")
        .body(Body::empty())
        .unwrap();
    let response = router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    assert_eq!(&bytes[..], b"weights");

    let (status, _) = send(&router, "GET", "/api/v1/runs/job-404/metrics", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn list_runs_rejects_unknown_status_filter() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    let (status, body) = send(&router, "GET", "/api/v1/runs?status=paused", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bad_request");
}

#[tokio::test]
async fn status_counts_jobs_and_workers() {
    let dir = tempfile::tempdir().unwrap();
    let router = build_router(test_state(&dir));
    send(&router, "POST", "/api/v1/jobs", Some(submit_body())).await;
    send(
        &router,
        "POST",
        "/api/v1/workers/register",
        Some(json!({"worker_id": "h:0", "host": "h", "slot": "0"})),
    )
    .await;

    let (status, counts) = send(&router, "GET", "/api/v1/status", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(counts["queued"], json!(1));
    assert_eq!(counts["running"], json!(0));
    assert_eq!(counts["workers_idle"], json!(1));
}

#[tokio::test]
async fn job_status_serialization_matches_wire() {
    // The job rows the API returns use the same lowercase statuses the
    // filter queries accept.
    assert_eq!(serde_json::to_value(JobStatus::Running).unwrap(), "running");
}
