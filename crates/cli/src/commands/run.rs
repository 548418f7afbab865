// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Run listing and log display.

use anyhow::{bail, Context};
use clap::Args;
use whirr_core::{Config, RunStatus};
use whirr_store::RunFilter;

use crate::store;

#[derive(Args)]
pub struct RunsArgs {
    /// Filter by status (running|completed|failed|cancelled)
    #[arg(long)]
    pub status: Option<String>,

    /// Filter by tag
    #[arg(long)]
    pub tag: Option<String>,

    /// Maximum rows
    #[arg(long)]
    pub limit: Option<usize>,
}

pub async fn list(config: &Config, args: RunsArgs) -> anyhow::Result<()> {
    let status = match args.status {
        Some(text) => match RunStatus::parse(&text) {
            Some(status) => Some(status),
            None => bail!("unknown status '{text}'"),
        },
        None => None,
    };
    let store = store::open(config, None)?;
    let runs = store
        .list_runs(RunFilter {
            status,
            tag: args.tag,
            limit: args.limit,
        })
        .await?;
    if runs.is_empty() {
        println!("no runs");
        return Ok(());
    }
    for run in runs {
        let name = run.name.as_deref().unwrap_or("-");
        println!(
            "{} {} {} started={}",
            run.run_id,
            run.status,
            name,
            run.started_at.to_rfc3339()
        );
    }
    Ok(())
}

/// Logs live on the shared filesystem, so this reads the file directly in
/// both modes rather than round-tripping through the server.
pub fn logs(config: &Config, run_id: &str) -> anyhow::Result<()> {
    let path = config.runs_root().join(run_id).join("output.log");
    let text =
        std::fs::read_to_string(&path).with_context(|| format!("reading {}", path.display()))?;
    print!("{text}");
    Ok(())
}
