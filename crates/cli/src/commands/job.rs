// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Job submission and lifecycle commands.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Args;
use whirr_core::{Config, JobSpec};

use crate::store;

#[derive(Args)]
pub struct SubmitArgs {
    /// Human-readable label for the run
    #[arg(long)]
    pub name: Option<String>,

    /// Tag (repeatable)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Working directory for the child (default: current directory)
    #[arg(long)]
    pub workdir: Option<PathBuf>,

    /// JSON file to record as the run's configuration
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// The program and its arguments (after `--`)
    #[arg(last = true, required = true)]
    pub command: Vec<String>,
}

pub async fn submit(config: &Config, args: SubmitArgs) -> anyhow::Result<()> {
    let workdir = match args.workdir {
        Some(dir) => dir,
        None => std::env::current_dir().context("resolving current directory")?,
    };
    let mut spec = JobSpec::new(args.command, workdir);
    spec.name = args.name;
    spec.tags = args.tags;
    if let Some(path) = args.config {
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {}", path.display()))?;
        spec.config =
            Some(serde_json::from_str(&text).with_context(|| format!("parsing {}", path.display()))?);
    }

    let store = store::open(config, None)?;
    let job = store.enqueue(spec).await?;
    println!("job {} queued as {}", job.id, job.run_id());
    println!("run dir: {}", config.runs_root().join(job.run_id()).display());
    Ok(())
}

pub async fn list(config: &Config) -> anyhow::Result<()> {
    let store = store::open(config, None)?;
    let jobs = store.list_active().await?;
    if jobs.is_empty() {
        println!("no active jobs");
        return Ok(());
    }
    for job in jobs {
        let label = job
            .name
            .clone()
            .unwrap_or_else(|| job.command_argv.join(" "));
        let owner = job.worker_id.as_deref().unwrap_or("-");
        println!(
            "{} {} attempt={} worker={} {}",
            job.id, job.status, job.attempt, owner, label
        );
    }
    Ok(())
}

pub async fn cancel(config: &Config, id: Option<i64>, all_queued: bool) -> anyhow::Result<()> {
    let store = store::open(config, None)?;
    match (id, all_queued) {
        (Some(id), false) => {
            let before = store.request_cancel(id).await?;
            println!("job {id} was {before}; cancellation requested");
        }
        (None, true) => {
            let ids = store.cancel_all_queued().await?;
            println!("cancelled {} queued job(s)", ids.len());
        }
        _ => bail!("pass a job id or --all-queued"),
    }
    Ok(())
}

pub async fn retry(config: &Config, id: i64) -> anyhow::Result<()> {
    let store = store::open(config, None)?;
    let job = store.retry(id).await?;
    println!(
        "job {} requeued as {} (attempt {})",
        id,
        job.id,
        job.attempt
    );
    Ok(())
}
