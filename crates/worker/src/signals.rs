// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Two-stage shutdown: first signal drains, second forces.
//!
//! The handler only bumps an atomic and wakes waiters; everything else
//! (stopping claims, terminating the child) happens in the worker's normal
//! control flow at the next supervision tick.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};

// Stage 0 is normal running.
const DRAIN: u8 = 1;
const FORCE: u8 = 2;

/// Shared shutdown stage, advanced by SIGINT/SIGTERM deliveries.
#[derive(Debug, Default)]
pub struct ShutdownState {
    stage: AtomicU8,
    notify: Notify,
}

impl ShutdownState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Listen for SIGINT and SIGTERM on a background task. Each delivery
    /// advances the stage by one, saturating at force.
    pub fn install(self: &Arc<Self>) -> std::io::Result<()> {
        let mut sigint = signal(SignalKind::interrupt())?;
        let mut sigterm = signal(SignalKind::terminate())?;
        let state = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = sigint.recv() => {}
                    _ = sigterm.recv() => {}
                }
                match state.trigger() {
                    DRAIN => info!("shutdown requested; finishing current job (signal again to force)"),
                    _ => warn!("forced shutdown; terminating current job"),
                }
            }
        });
        Ok(())
    }

    /// Advance to the next stage and wake all waiters. Returns the new stage.
    pub fn trigger(&self) -> u8 {
        let stage = self
            .stage
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |s| {
                Some(s.saturating_add(1).min(FORCE))
            })
            .map(|prev| prev.saturating_add(1).min(FORCE))
            .unwrap_or(FORCE);
        self.notify.notify_waiters();
        stage
    }

    /// Drain or force has been requested.
    pub fn draining(&self) -> bool {
        self.stage.load(Ordering::SeqCst) >= DRAIN
    }

    pub fn forced(&self) -> bool {
        self.stage.load(Ordering::SeqCst) >= FORCE
    }

    /// Wait until the stage next advances.
    pub async fn changed(&self) {
        self.notify.notified().await;
    }
}

#[cfg(test)]
#[path = "signals_tests.rs"]
mod tests;
