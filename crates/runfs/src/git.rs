// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Best-effort git snapshot for `meta.json`.

use std::path::Path;
use std::process::Command;

use crate::meta::GitInfo;

/// Capture commit/branch/dirty state of `workdir`.
///
/// Returns `None` when `git` is unavailable or the directory is not inside a
/// repository; a run without git info is perfectly valid.
pub fn capture_git_info(workdir: &Path) -> Option<GitInfo> {
    let commit = git_stdout(workdir, &["rev-parse", "HEAD"])?;
    let branch = git_stdout(workdir, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    let dirty = git_stdout(workdir, &["status", "--porcelain"])
        .map(|s| !s.is_empty())
        .unwrap_or(false);
    let remote_url = git_stdout(workdir, &["remote", "get-url", "origin"]);
    Some(GitInfo {
        commit,
        branch,
        dirty,
        remote_url,
    })
}

fn git_stdout(workdir: &Path, args: &[&str]) -> Option<String> {
    let output = Command::new("git")
        .args(args)
        .current_dir(workdir)
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
    Some(text)
}
