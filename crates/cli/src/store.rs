// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store selection: embedded file vs. HTTP, decided by configuration.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use whirr_client::HttpStore;
use whirr_core::Config;
use whirr_store::{SqliteStore, Store};

pub fn load_config(
    data_dir: Option<PathBuf>,
    server: Option<String>,
) -> anyhow::Result<Config> {
    let mut config = Config::load(data_dir).context("loading configuration")?;
    if server.is_some() {
        config.server_url = server;
    }
    Ok(config)
}

/// Open the store this invocation should talk to.
///
/// A configured server URL selects networked mode; otherwise the embedded
/// store in the (initialized) data root is opened directly.
pub fn open(config: &Config, slot: Option<u32>) -> anyhow::Result<Arc<dyn Store>> {
    match &config.server_url {
        Some(url) => Ok(Arc::new(HttpStore::for_slot(url, slot))),
        None => {
            config.require_initialized()?;
            let store = SqliteStore::open(&config.db_path())
                .with_context(|| format!("opening {}", config.db_path().display()))?;
            Ok(Arc::new(store))
        }
    }
}
