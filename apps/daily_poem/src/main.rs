use std::{path::PathBuf, process::ExitCode, sync::Arc};

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use client_core::{
    load_settings, HttpPoemService, PoemStateHandle, PoemSyncController, SystemClock,
};
use shared::domain::SnapshotStatus;
use tracing::info;
use tracing_subscriber::EnvFilter;

mod render;

#[derive(Parser, Debug)]
#[command(about = "Shows the poem of the day")]
struct Args {
    /// TOML settings file; defaults to ./daily_poem.toml when present.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Overrides the configured poem service base URL.
    #[arg(long)]
    service_url: Option<String>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    /// Load and print the current poem.
    Show,
    /// Ask the service for a new poem, then print it.
    Regenerate,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    let args = Args::parse();

    let mut settings = load_settings(args.config.as_deref()).context("failed to load settings")?;
    if let Some(url) = &args.service_url {
        settings = settings
            .with_service_url(url)
            .context("invalid --service-url")?;
    }
    info!(service_url = %settings.service_url, "using poem service");

    let service = HttpPoemService::from_settings(&settings)
        .context("failed to build poem service client")?;
    let controller: Arc<dyn PoemStateHandle> = PoemSyncController::new_with_dependencies(
        Arc::new(service),
        Arc::new(SystemClock),
        settings.retry,
    );

    controller.load().await;
    if args.command.unwrap_or(Command::Show) == Command::Regenerate {
        controller.regenerate().await;
    }

    let snapshot = controller.snapshot();
    print!("{}", render::render(&snapshot, Local::now().date_naive()));

    Ok(if snapshot.status() == SnapshotStatus::Error {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
