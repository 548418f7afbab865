// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Child-process supervision.
//!
//! The child leads a fresh process group so one signal reaches its whole
//! tree. Parent-death signaling is deliberately not used (it would require
//! `unsafe` pre-exec hooks); if this process dies without cleaning up, the
//! orphan reaper requeues the job and the group kill on the next owner's
//! `NotOwner` path removes stragglers.

use std::os::unix::process::CommandExt;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use nix::sys::signal::{killpg, Signal};
use nix::unistd::Pid;
use tokio::process::{Child, Command};
use tracing::{debug, warn};
use whirr_core::{Job, JobStatus, SENTINEL_EXIT_CODE};
use whirr_runfs::RunDir;
use whirr_store::{Store, StoreError};

use crate::backoff::Backoff;
use crate::error::WorkerError;
use crate::signals::ShutdownState;

/// Environment injected into every supervised child.
pub const ENV_JOB_ID: &str = "WHIRR_JOB_ID";
pub const ENV_RUN_ID: &str = "WHIRR_RUN_ID";
pub const ENV_RUN_DIR: &str = "WHIRR_RUN_DIR";
/// Advisory accelerator visibility; the script may ignore it.
pub const ENV_ACCELERATOR: &str = "CUDA_VISIBLE_DEVICES";

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub worker_id: String,
    /// Bounded wait between lease renewals.
    pub heartbeat: Duration,
    pub lease: Duration,
    /// SIGTERM-to-SIGKILL window.
    pub grace: Duration,
    pub slot: Option<u32>,
}

/// How one supervised run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub exit_code: i32,
    pub status: JobStatus,
}

enum Tick {
    Exited(std::io::Result<std::process::ExitStatus>),
    Poll,
}

/// Runs one job's child process to completion.
pub struct Supervisor {
    store: Arc<dyn Store>,
    shutdown: Arc<ShutdownState>,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(
        store: Arc<dyn Store>,
        shutdown: Arc<ShutdownState>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            store,
            shutdown,
            config,
        }
    }

    /// Launch and supervise `job`, merging its output into the run's log.
    ///
    /// Startup failures (missing workdir, missing executable) finalize as a
    /// failed outcome with the sentinel exit code; they are recorded in the
    /// log file rather than raised. `Err(WorkerError::LeaseLost)` means the
    /// child was killed and the caller must not write any further state.
    pub async fn run(&self, job: &Job, run_dir: &RunDir) -> Result<Outcome, WorkerError> {
        if !job.workdir.is_dir() {
            self.log_startup_failure(
                run_dir,
                &format!("workdir {} does not exist", job.workdir.display()),
            );
            return Ok(Outcome {
                exit_code: SENTINEL_EXIT_CODE,
                status: JobStatus::Failed,
            });
        }

        let log = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_dir.output_log_path())?;
        let log_err = log.try_clone()?;

        let mut command = Command::new(&job.command_argv[0]);
        command
            .args(&job.command_argv[1..])
            .current_dir(&job.workdir)
            .env(ENV_JOB_ID, job.id.to_string())
            .env(ENV_RUN_ID, job.run_id())
            .env(ENV_RUN_DIR, run_dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::from(log))
            .stderr(Stdio::from(log_err))
            // Backstop for abnormal supervisor exits; normal paths reap below.
            .kill_on_drop(true);
        if let Some(slot) = self.config.slot {
            command.env(ENV_ACCELERATOR, slot.to_string());
        }
        // New process group with the child as leader: the kill target.
        command.as_std_mut().process_group(0);

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                self.log_startup_failure(
                    run_dir,
                    &format!("failed to launch {}: {e}", job.command_argv[0]),
                );
                return Ok(Outcome {
                    exit_code: SENTINEL_EXIT_CODE,
                    status: JobStatus::Failed,
                });
            }
        };
        let pgid = child.id().map(|pid| Pid::from_raw(pid as i32));
        debug!(job_id = job.id, pid = ?child.id(), "child started");

        let mut cancelled = false;
        let mut backoff = Backoff::for_store();
        let exit_status = loop {
            let tick = tokio::select! {
                status = child.wait() => Tick::Exited(status),
                _ = tokio::time::sleep(self.config.heartbeat) => Tick::Poll,
                _ = self.shutdown.changed() => Tick::Poll,
            };
            match tick {
                Tick::Exited(status) => break status?,
                Tick::Poll => {
                    if self.shutdown.forced() {
                        cancelled = true;
                        break self.terminate(&mut child, pgid).await?;
                    }
                    match self
                        .store
                        .renew(job.id, &self.config.worker_id, self.config.lease)
                        .await
                    {
                        Ok(lease) => {
                            backoff.reset();
                            if lease.cancel_requested {
                                cancelled = true;
                                break self.terminate(&mut child, pgid).await?;
                            }
                        }
                        Err(StoreError::NotOwner { .. }) => {
                            warn!(job_id = job.id, "lease no longer ours; killing child");
                            let _ = self.terminate(&mut child, pgid).await;
                            return Err(WorkerError::LeaseLost(job.id));
                        }
                        Err(e) if e.is_transient() => match backoff.next_delay() {
                            Some(delay) => {
                                warn!(job_id = job.id, error = %e, "renewal failed; retrying");
                                tokio::time::sleep(delay).await;
                            }
                            None => {
                                warn!(job_id = job.id, error = %e, "renewal retries exhausted; killing child");
                                let _ = self.terminate(&mut child, pgid).await;
                                return Err(WorkerError::LeaseLost(job.id));
                            }
                        },
                        Err(e) => {
                            let _ = self.terminate(&mut child, pgid).await;
                            return Err(e.into());
                        }
                    }
                }
            }
        };

        let exit_code = exit_status.code().unwrap_or(SENTINEL_EXIT_CODE);
        let status = if cancelled {
            JobStatus::Cancelled
        } else if exit_code == 0 {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        debug!(job_id = job.id, exit_code, status = %status, "child exited");
        Ok(Outcome { exit_code, status })
    }

    /// Cooperative-then-forceful group termination: SIGTERM, wait out the
    /// grace window, then SIGKILL. Always reaps the child.
    async fn terminate(
        &self,
        child: &mut Child,
        pgid: Option<Pid>,
    ) -> std::io::Result<std::process::ExitStatus> {
        if let Some(pgid) = pgid {
            let _ = killpg(pgid, Signal::SIGTERM);
        } else {
            let _ = child.start_kill();
        }
        match tokio::time::timeout(self.config.grace, child.wait()).await {
            Ok(status) => status,
            Err(_) => {
                if let Some(pgid) = pgid {
                    let _ = killpg(pgid, Signal::SIGKILL);
                } else {
                    let _ = child.start_kill();
                }
                child.wait().await
            }
        }
    }

    /// Startup failures go to the log file, not up the stack.
    fn log_startup_failure(&self, run_dir: &RunDir, message: &str) {
        use std::io::Write;
        if let Ok(mut log) = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(run_dir.output_log_path())
        {
            let _ = writeln!(log, "whirr: {message}");
        }
        warn!(run_id = run_dir.run_id(), "{message}");
    }
}

#[cfg(test)]
#[path = "supervisor_tests.rs"]
mod tests;
