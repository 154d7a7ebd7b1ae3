// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! hugin - sequencing run and project lifecycle monitor
//!
//! Runs one pass and exits:
//! - `runs`: infer run stages and reconcile the run board
//! - `projects`: infer project stages and reconcile the project board
//! - `handover`: detect runs whose samples reached the analysis folders
//! - `archive-runs`: move old terminal run cards to the archive board

use std::sync::Arc;

use chrono::Utc;
use clap::{Parser, Subcommand};
use hugin_core::{BoardService, XmlMetadataReader};
use hugin_monitor::{
    DryRunBoard, HandoverMonitor, MonitorConfig, ProjectMonitor, RunMonitor, StatusNotifier,
};
use hugin_trello::TrelloClient;
use tracing::{info, warn};

#[derive(Debug, Parser)]
#[command(name = "hugin", version, about = "Tracks sequencing runs and projects on a Trello board")]
struct Cli {
    /// Log board mutations instead of sending them
    #[arg(long, global = true, env = "HUGIN_DRY_RUN")]
    dry_run: bool,

    /// Runs processed at once
    #[arg(long, global = true)]
    concurrency: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Reconcile the run board
    Runs,
    /// Reconcile the project board
    Projects {
        /// Skip archiving of removed projects
        #[arg(long)]
        no_archive: bool,
    },
    /// Hand over runs whose samples are all in the analysis folders
    Handover,
    /// Archive terminal run cards past the retention window
    ArchiveRuns,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "hugin=info,hugin_monitor=info,hugin_core=info,hugin_trello=info".into()
            }),
        )
        .init();

    // Load .env before parsing so env-backed flags see it
    if let Err(e) = dotenvy::dotenv() {
        warn!("No .env file loaded: {}", e);
    }

    let cli = Cli::parse();

    let mut config = MonitorConfig::from_env()?;
    if let Some(concurrency) = cli.concurrency {
        config = config.with_concurrency(concurrency);
    }
    let config = Arc::new(config);

    let trello = TrelloClient::from_env()?;
    let board: Arc<dyn BoardService> = if cli.dry_run {
        Arc::new(DryRunBoard::new(trello))
    } else {
        Arc::new(trello)
    };
    let notifier = StatusNotifier::from_config(&config)?;

    info!(
        command = ?cli.command,
        dry_run = cli.dry_run,
        board_service = board.service_type(),
        notifier = notifier.sink_type(),
        host = %config.host,
        "Starting hugin"
    );

    let now = Utc::now();
    match cli.command {
        Command::Runs => {
            let monitor = RunMonitor::new(config, board, Arc::new(XmlMetadataReader), notifier);
            let summary = monitor.run_pass(now).await?;
            if summary.failed > 0 {
                warn!(failed = summary.failed, "Some runs could not be processed");
            }
        }
        Command::Projects { no_archive } => {
            let monitor = ProjectMonitor::new(config, board, notifier);
            monitor.project_pass(now, !no_archive).await?;
        }
        Command::Handover => {
            HandoverMonitor::new(config, board).handover_pass().await?;
        }
        Command::ArchiveRuns => {
            let monitor = RunMonitor::new(config, board, Arc::new(XmlMetadataReader), notifier);
            monitor.archive_pass(now).await?;
        }
    }

    Ok(())
}
