// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Router assembly, startup tasks, and the periodic reaper.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use chrono::Utc;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use whirr_store::Store;

use crate::routes;

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub runs_root: PathBuf,
    /// Lease granted on heartbeats (the claim body carries its own).
    pub lease: Duration,
}

/// Assemble the `/api/v1` router over the given store and runs root.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/v1/status", get(routes::status))
        .route("/api/v1/jobs", post(routes::submit).get(routes::list_active))
        .route("/api/v1/jobs/claim", post(routes::claim))
        .route("/api/v1/jobs/cancel-queued", post(routes::cancel_queued))
        .route("/api/v1/jobs/:id", get(routes::get_job))
        .route("/api/v1/jobs/:id/cancel", post(routes::cancel))
        .route("/api/v1/jobs/:id/retry", post(routes::retry))
        .route("/api/v1/jobs/:id/heartbeat", post(routes::heartbeat))
        .route("/api/v1/jobs/:id/complete", post(routes::complete))
        .route("/api/v1/workers/register", post(routes::register_worker))
        .route("/api/v1/workers", get(routes::list_workers))
        .route("/api/v1/runs", get(routes::list_runs))
        .route("/api/v1/runs/:run_id", get(routes::get_run))
        .route("/api/v1/runs/:run_id/metrics", get(routes::run_metrics))
        .route("/api/v1/runs/:run_id/artifacts", get(routes::list_artifacts))
        .route(
            "/api/v1/runs/:run_id/artifacts/*path",
            get(routes::read_artifact),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve until the process is stopped.
///
/// On startup: rebuild the run index from the filesystem when the store has
/// none (the filesystem is authoritative), then spawn the periodic reaper at
/// half the lease period.
pub async fn serve(state: AppState, bind: &str) -> std::io::Result<()> {
    rebuild_index_if_empty(&state).await;
    spawn_reaper(Arc::clone(&state.store), state.lease);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "whirr server listening");
    axum::serve(listener, build_router(state)).await
}

async fn rebuild_index_if_empty(state: &AppState) {
    let existing = match state.store.list_runs(Default::default()).await {
        Ok(runs) => runs,
        Err(e) => {
            warn!(error = %e, "could not read run index");
            return;
        }
    };
    if !existing.is_empty() {
        return;
    }
    let scanned = match whirr_runfs::scan_runs(&state.runs_root) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, "run directory scan failed");
            return;
        }
    };
    if scanned.is_empty() {
        return;
    }
    info!(count = scanned.len(), "rebuilding run index from filesystem");
    for record in scanned {
        if let Err(e) = state.store.upsert_run(record).await {
            warn!(error = %e, "failed to upsert scanned run");
        }
    }
}

fn spawn_reaper(store: Arc<dyn Store>, lease: Duration) {
    let period = (lease / 2).max(Duration::from_secs(1));
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await; // immediate tick is skipped
        loop {
            ticker.tick().await;
            match store.reap_expired(Utc::now()).await {
                Ok(ids) => {
                    for job_id in ids {
                        info!(job_id, "requeued job with expired lease");
                    }
                }
                Err(e) => warn!(error = %e, "reaper pass failed"),
            }
        }
    });
}

#[cfg(test)]
#[path = "app_tests.rs"]
mod tests;
