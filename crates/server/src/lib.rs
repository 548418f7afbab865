// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! whirr-server: the HTTP front over a store and the shared run directory.
//!
//! Multi-host deployments put this in front of the relational store; workers
//! and the CLI then speak the `/api/v1` surface instead of opening the store
//! directly. The server also runs the orphan reaper periodically, since in
//! networked mode no single worker startup can be relied on for recovery.

mod app;
mod error;
mod routes;

pub use app::{build_router, serve, AppState};
pub use error::ServerError;
