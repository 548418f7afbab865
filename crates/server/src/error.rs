// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error-to-response mapping: every failure becomes an HTTP status plus a
//! `{"error": "<kind>", "detail": "<message>"}` body.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use whirr_runfs::RunDirError;
use whirr_store::{api::ErrorBody, StoreError};

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    RunDir(#[from] RunDirError),

    #[error("{0}")]
    BadRequest(String),
}

impl ServerError {
    fn status(&self) -> StatusCode {
        match self {
            ServerError::Store(e) => match e {
                StoreError::NotFound(_) => StatusCode::NOT_FOUND,
                StoreError::NotOwner { .. } | StoreError::NotRetryable { .. } => {
                    StatusCode::CONFLICT
                }
                StoreError::InvalidSpec(_) => StatusCode::BAD_REQUEST,
                StoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
                StoreError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::RunDir(e) => match e {
                RunDirError::NotFound(_) | RunDirError::ArtifactNotFound(_) => {
                    StatusCode::NOT_FOUND
                }
                RunDirError::ArtifactOutsideRoot(_) => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            ServerError::Store(e) => e.kind(),
            ServerError::RunDir(e) => match e {
                RunDirError::NotFound(_) => "not_found",
                RunDirError::ArtifactNotFound(_) => "not_found",
                RunDirError::ArtifactOutsideRoot(_) => "bad_path",
                RunDirError::CorruptRecord { .. } => "corrupt_record",
                _ => "io",
            },
            ServerError::BadRequest(_) => "bad_request",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.kind().to_string(),
            detail: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
