// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whirr status`

use whirr_core::Config;

use crate::store;

pub async fn handle(config: &Config) -> anyhow::Result<()> {
    let store = store::open(config, None)?;
    let counts = store.status().await?;
    println!(
        "jobs: {} queued, {} running, {} completed, {} failed, {} cancelled",
        counts.queued, counts.running, counts.completed, counts.failed, counts.cancelled
    );
    println!(
        "workers: {} idle, {} busy",
        counts.workers_idle, counts.workers_busy
    );
    Ok(())
}
