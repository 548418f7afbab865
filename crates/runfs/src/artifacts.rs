// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact listing and path resolution.

use std::path::{Component, Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RunDirError;

/// One file under `artifacts/`, path relative to that directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

/// Recursively list artifacts. A run without an `artifacts/` directory has
/// none.
pub(crate) fn list(artifacts_root: &Path) -> Result<Vec<ArtifactEntry>, RunDirError> {
    let mut entries = Vec::new();
    if !artifacts_root.is_dir() {
        return Ok(entries);
    }
    walk(artifacts_root, artifacts_root, &mut entries)?;
    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

fn walk(
    root: &Path,
    dir: &Path,
    out: &mut Vec<ArtifactEntry>,
) -> Result<(), RunDirError> {
    let read = std::fs::read_dir(dir).map_err(|e| RunDirError::io(dir, e))?;
    for entry in read {
        let entry = entry.map_err(|e| RunDirError::io(dir, e))?;
        let path = entry.path();
        if path.is_dir() {
            walk(root, &path, out)?;
            continue;
        }
        let meta = entry.metadata().map_err(|e| RunDirError::io(&path, e))?;
        let modified: DateTime<Utc> = meta
            .modified()
            .map_err(|e| RunDirError::io(&path, e))?
            .into();
        let rel = path
            .strip_prefix(root)
            .unwrap_or(&path)
            .to_string_lossy()
            .into_owned();
        out.push(ArtifactEntry {
            path: rel,
            size: meta.len(),
            modified,
        });
    }
    Ok(())
}

/// Resolve a relative artifact path, rejecting anything that would escape the
/// artifacts directory (`..`, absolute paths).
pub(crate) fn resolve(artifacts_root: &Path, relpath: &str) -> Result<PathBuf, RunDirError> {
    let rel = Path::new(relpath);
    if rel.components().any(|c| {
        !matches!(c, Component::Normal(_))
    }) {
        return Err(RunDirError::ArtifactOutsideRoot(relpath.to_string()));
    }
    let full = artifacts_root.join(rel);
    if !full.is_file() {
        return Err(RunDirError::ArtifactNotFound(relpath.to_string()));
    }
    Ok(full)
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
