// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker errors.

use whirr_runfs::RunDirError;
use whirr_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    RunDir(#[from] RunDirError),

    /// The store no longer recognizes this worker as the job's owner; the
    /// job was reaped (or cancelled out from under us). The child has been
    /// killed and no further state may be written for this job.
    #[error("lost lease on job {0}; abandoned")]
    LeaseLost(i64),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
