// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run-directory errors.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum RunDirError {
    #[error("run '{0}' not found")]
    NotFound(String),

    #[error("io error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid json in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A malformed record that is *not* the final line of the stream.
    /// (A truncated final line is treated as EOF, not an error.)
    #[error("corrupt record at {path}:{line}")]
    CorruptRecord { path: PathBuf, line: usize },

    #[error("artifact path '{0}' escapes the artifacts directory")]
    ArtifactOutsideRoot(String),

    #[error("artifact '{0}' not found")]
    ArtifactNotFound(String),
}

impl RunDirError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
