// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `meta.json`: the single-object summary of one run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use whirr_core::RunStatus;

/// Best-effort snapshot of the git state of the submitted workdir.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitInfo {
    pub commit: String,
    pub branch: String,
    pub dirty: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
}

/// The contents of `meta.json`.
///
/// Written by the supervisor (seed + finalize) in queued mode, or by the
/// user-script library in direct mode. Field values must survive a
/// write-then-read round trip bit-for-bit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(default)]
    pub tags: Vec<String>,
    /// Name of the configuration file inside the run directory.
    pub config_file: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_info: Option<GitInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
}

impl RunMeta {
    /// Initial metadata for a run that just started executing.
    pub fn seed(
        run_id: impl Into<String>,
        name: Option<String>,
        tags: Vec<String>,
        started_at: DateTime<Utc>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            name,
            status: RunStatus::Running,
            started_at,
            finished_at: None,
            duration_seconds: None,
            tags,
            config_file: crate::CONFIG_FILE.to_string(),
            summary: None,
            git_info: None,
            exit_code: None,
        }
    }

    /// Fill in the terminal fields.
    pub fn finalize(&mut self, status: RunStatus, exit_code: i32, finished_at: DateTime<Utc>) {
        self.status = status;
        self.finished_at = Some(finished_at);
        self.duration_seconds =
            Some((finished_at - self.started_at).num_milliseconds() as f64 / 1000.0);
        self.exit_code = Some(exit_code);
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
