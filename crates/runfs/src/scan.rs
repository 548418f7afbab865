// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Rebuild the run index from the filesystem.

use std::path::Path;

use tracing::warn;
use whirr_core::RunRecord;

use crate::error::RunDirError;
use crate::rundir::RunDir;

/// Reconstruct index rows from every run directory under `runs_root`.
///
/// The filesystem is authoritative; the store's index is a cache of this
/// scan. Directories without a readable `meta.json` are skipped with a
/// warning rather than failing the whole rebuild.
pub fn scan_runs(runs_root: &Path) -> Result<Vec<RunRecord>, RunDirError> {
    let mut records = Vec::new();
    let entries = match std::fs::read_dir(runs_root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(records),
        Err(e) => return Err(RunDirError::io(runs_root, e)),
    };

    for entry in entries {
        let entry = entry.map_err(|e| RunDirError::io(runs_root, e))?;
        if !entry.path().is_dir() {
            continue;
        }
        let run_id = entry.file_name().to_string_lossy().into_owned();
        let dir = match RunDir::open(runs_root, &run_id) {
            Ok(dir) => dir,
            Err(_) => continue,
        };
        match dir.read_meta() {
            Ok(meta) => records.push(RunRecord {
                run_id: meta.run_id,
                job_id: job_id_from_run_id(&run_id),
                name: meta.name,
                status: meta.status,
                tags: meta.tags,
                started_at: meta.started_at,
                finished_at: meta.finished_at,
            }),
            Err(e) => {
                warn!(run_id = %run_id, error = %e, "skipping run with unreadable meta.json");
            }
        }
    }

    records.sort_by(|a, b| b.started_at.cmp(&a.started_at));
    Ok(records)
}

/// `job-<id>` run ids carry their job id; direct-mode ids do not.
fn job_id_from_run_id(run_id: &str) -> Option<i64> {
    run_id.strip_prefix("job-")?.parse().ok()
}

#[cfg(test)]
#[path = "scan_tests.rs"]
mod tests;
