// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! whirr: submit and supervise long-running experiment commands.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod store;

#[derive(Parser)]
#[command(name = "whirr", version, about = "Job orchestration for ML experiments")]
struct Cli {
    /// Data root (default: $WHIRR_DATA_DIR or ./.whirr)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Server URL for networked mode (default: $WHIRR_SERVER_URL)
    #[arg(long, global = true)]
    server: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the data root
    Init,
    /// Submit a command to the queue
    Submit(commands::job::SubmitArgs),
    /// Queue and worker counts
    Status,
    /// List queued and running jobs
    Jobs,
    /// List runs from the index
    Runs(commands::run::RunsArgs),
    /// Print a run's captured output
    Logs {
        /// Run id (`job-<id>` or `local-…`)
        run_id: String,
    },
    /// Cancel a job (or everything still queued)
    Cancel {
        /// Job id
        id: Option<i64>,
        /// Cancel every queued job instead
        #[arg(long)]
        all_queued: bool,
    },
    /// Resubmit a failed or cancelled job
    Retry {
        /// Job id
        id: i64,
    },
    /// Run a worker on this host
    Worker {
        /// Accelerator index for this worker (sets CUDA_VISIBLE_DEVICES)
        #[arg(long)]
        slot: Option<u32>,
    },
    /// Run the HTTP server
    Serve {
        /// Postgres URL for the relational store (default: embedded store)
        #[arg(long)]
        pg_url: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("WHIRR_LOG").unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = store::load_config(cli.data_dir, cli.server)?;
    match cli.command {
        Command::Init => commands::init::handle(&config),
        Command::Submit(args) => commands::job::submit(&config, args).await,
        Command::Status => commands::status::handle(&config).await,
        Command::Jobs => commands::job::list(&config).await,
        Command::Runs(args) => commands::run::list(&config, args).await,
        Command::Logs { run_id } => commands::run::logs(&config, &run_id),
        Command::Cancel { id, all_queued } => commands::job::cancel(&config, id, all_queued).await,
        Command::Retry { id } => commands::job::retry(&config, id).await,
        Command::Worker { slot } => commands::worker::handle(&config, slot).await,
        Command::Serve { pg_url } => commands::serve::handle(&config, pg_url).await,
    }
}
