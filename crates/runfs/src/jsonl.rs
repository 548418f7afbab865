// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only JSONL streams (`metrics.jsonl`, `system.jsonl`).
//!
//! The writer appends one object per line. A writer crash can leave a
//! truncated final line; readers treat that as end-of-stream rather than
//! corruption, so metrics written up to the crash point are never lost.

use std::io::Write;
use std::path::Path;

use serde_json::Value;

use crate::error::RunDirError;

/// Read every complete record from a JSONL file.
///
/// A missing file reads as empty. A final line that does not parse is taken
/// as a truncated in-flight append and dropped; an unparseable line anywhere
/// before that is a hard [`RunDirError::CorruptRecord`].
pub fn read_jsonl(path: &Path) -> Result<Vec<Value>, RunDirError> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(RunDirError::io(path, e)),
    };

    let mut records = Vec::new();
    let mut lines = text.split('\n').enumerate().peekable();
    while let Some((idx, line)) = lines.next() {
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(line) {
            Ok(value) => records.push(value),
            Err(_) if lines.peek().is_none() => {
                // Truncated trailing record: EOF.
                tracing::debug!(path = %path.display(), line = idx + 1, "dropping truncated trailing record");
                break;
            }
            Err(_) => {
                return Err(RunDirError::CorruptRecord {
                    path: path.to_path_buf(),
                    line: idx + 1,
                });
            }
        }
    }
    Ok(records)
}

/// Append one record, newline-terminated, flushing before returning.
pub fn append_jsonl(path: &Path, record: &Value) -> Result<(), RunDirError> {
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| RunDirError::io(path, e))?;
    let mut line = serde_json::to_vec(record).map_err(|source| RunDirError::Json {
        path: path.to_path_buf(),
        source,
    })?;
    line.push(b'\n');
    file.write_all(&line).map_err(|e| RunDirError::io(path, e))?;
    file.flush().map_err(|e| RunDirError::io(path, e))
}

#[cfg(test)]
#[path = "jsonl_tests.rs"]
mod tests;
