// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `whirr serve`

use std::sync::Arc;

use anyhow::Context;
use whirr_core::Config;
use whirr_server::{serve, AppState};
use whirr_store::{PgStore, SqliteStore, Store};

pub async fn handle(config: &Config, pg_url: Option<String>) -> anyhow::Result<()> {
    config.require_initialized()?;
    let store: Arc<dyn Store> = match pg_url {
        Some(url) => {
            let store = PgStore::connect(&url).await.context("connecting to postgres")?;
            store.migrate().await.context("applying schema")?;
            Arc::new(store)
        }
        None => Arc::new(
            SqliteStore::open(&config.db_path())
                .with_context(|| format!("opening {}", config.db_path().display()))?,
        ),
    };

    let state = AppState {
        store,
        runs_root: config.runs_root(),
        lease: config.lease,
    };
    serve(state, &config.bind).await.context("serving")?;
    Ok(())
}
