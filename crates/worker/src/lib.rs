// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! whirr-worker: claims jobs and supervises their child processes.
//!
//! One worker process per accelerator. The worker owns exactly one child at
//! a time: claim, launch in a fresh process group, renew the lease while the
//! child runs, observe cancellation on the renewal path, and finalize both
//! the run directory and the store on exit.

mod backoff;
mod error;
mod signals;
mod supervisor;
mod worker;

pub use backoff::Backoff;
pub use error::WorkerError;
pub use signals::ShutdownState;
pub use supervisor::{Outcome, Supervisor, SupervisorConfig};
pub use worker::Worker;
