// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! whirr-client: the store contract spoken over HTTP.
//!
//! [`HttpStore`] implements [`whirr_store::Store`] against a whirr server,
//! so workers and the CLI run the same code in embedded and networked mode
//! and only the store handle differs.

mod http;

pub use http::HttpStore;
