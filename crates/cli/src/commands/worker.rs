// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whirr worker`

use whirr_core::Config;
use whirr_worker::{ShutdownState, Worker};

use crate::store;

pub async fn handle(config: &Config, slot: Option<u32>) -> anyhow::Result<()> {
    // Embedded mode needs the runs root even before the first claim.
    if config.server_url.is_none() {
        config.require_initialized()?;
    }
    let store = store::open(config, slot)?;

    let shutdown = ShutdownState::new();
    shutdown.install()?;

    let worker = Worker::new(store, config.clone(), slot, shutdown);
    worker.run().await?;
    Ok(())
}
