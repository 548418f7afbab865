// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Handle to one run directory.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde_json::Value;
use whirr_core::RunStatus;

use crate::artifacts::{self, ArtifactEntry};
use crate::error::RunDirError;
use crate::jsonl;
use crate::meta::RunMeta;

/// A run directory that is known to exist on disk.
#[derive(Debug, Clone)]
pub struct RunDir {
    path: PathBuf,
    run_id: String,
}

impl RunDir {
    /// Create `<runs_root>/<run_id>/` (and the runs root itself) if missing.
    pub fn create(runs_root: &Path, run_id: &str) -> Result<Self, RunDirError> {
        let path = runs_root.join(run_id);
        std::fs::create_dir_all(&path).map_err(|e| RunDirError::io(&path, e))?;
        Ok(Self {
            path,
            run_id: run_id.to_string(),
        })
    }

    /// Open an existing run directory; `NotFound` when absent.
    pub fn open(runs_root: &Path, run_id: &str) -> Result<Self, RunDirError> {
        let path = runs_root.join(run_id);
        if !path.is_dir() {
            return Err(RunDirError::NotFound(run_id.to_string()));
        }
        Ok(Self {
            path,
            run_id: run_id.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn output_log_path(&self) -> PathBuf {
        self.path.join(crate::OUTPUT_LOG_FILE)
    }

    pub fn metrics_path(&self) -> PathBuf {
        self.path.join(crate::METRICS_FILE)
    }

    pub fn artifacts_dir(&self) -> PathBuf {
        self.path.join(crate::ARTIFACTS_DIR)
    }

    /// Write the user configuration object to `config.json`.
    pub fn write_config(&self, config: &Value) -> Result<(), RunDirError> {
        let path = self.path.join(crate::CONFIG_FILE);
        let text =
            serde_json::to_vec_pretty(config).map_err(|source| RunDirError::Json {
                path: path.clone(),
                source,
            })?;
        std::fs::write(&path, text).map_err(|e| RunDirError::io(&path, e))
    }

    /// Write `meta.json` atomically (temp file + rename) so concurrent
    /// readers never observe a torn object.
    pub fn write_meta(&self, meta: &RunMeta) -> Result<(), RunDirError> {
        let path = self.path.join(crate::META_FILE);
        let tmp = self.path.join(".meta.json.tmp");
        let mut text = serde_json::to_vec_pretty(meta).map_err(|source| RunDirError::Json {
            path: path.clone(),
            source,
        })?;
        text.push(b'\n');
        std::fs::write(&tmp, text).map_err(|e| RunDirError::io(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| RunDirError::io(&path, e))
    }

    pub fn read_meta(&self) -> Result<RunMeta, RunDirError> {
        let path = self.path.join(crate::META_FILE);
        let text = std::fs::read_to_string(&path).map_err(|e| RunDirError::io(&path, e))?;
        serde_json::from_str(&text).map_err(|source| RunDirError::Json { path, source })
    }

    /// Seed `meta.json` for a run that just started, and return it.
    pub fn seed_meta(
        &self,
        name: Option<String>,
        tags: Vec<String>,
        started_at: DateTime<Utc>,
        git_info: Option<crate::meta::GitInfo>,
    ) -> Result<RunMeta, RunDirError> {
        let mut meta = RunMeta::seed(&self.run_id, name, tags, started_at);
        meta.git_info = git_info;
        self.write_meta(&meta)?;
        Ok(meta)
    }

    /// Rewrite `meta.json` with the terminal fields filled in.
    pub fn finalize_meta(
        &self,
        status: RunStatus,
        exit_code: i32,
        finished_at: DateTime<Utc>,
    ) -> Result<RunMeta, RunDirError> {
        let mut meta = self.read_meta()?;
        meta.finalize(status, exit_code, finished_at);
        self.write_meta(&meta)?;
        Ok(meta)
    }

    /// Parsed records of `metrics.jsonl` (empty when absent).
    pub fn read_metrics(&self) -> Result<Vec<Value>, RunDirError> {
        jsonl::read_jsonl(&self.metrics_path())
    }

    pub fn list_artifacts(&self) -> Result<Vec<ArtifactEntry>, RunDirError> {
        artifacts::list(&self.artifacts_dir())
    }

    /// Resolve a relative artifact path inside this run, rejecting traversal.
    pub fn artifact_path(&self, relpath: &str) -> Result<PathBuf, RunDirError> {
        artifacts::resolve(&self.artifacts_dir(), relpath)
    }
}

#[cfg(test)]
#[path = "rundir_tests.rs"]
mod tests;
