// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The scheduler daemon.

use atlas_cli::{handlers, init_tracing};
use atlas_core::ServiceConfig;
use atlas_daemon::{acquire_lock_file, Daemon};
use atlas_worker::install_catalog;
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "atlasd", about = "Atlas task scheduler daemon")]
struct Cli {
    /// Path to the service configuration.
    #[arg(long, default_value = "atlas.toml")]
    config: PathBuf,
    /// State directory (lock file). Defaults to the platform state dir.
    #[arg(long)]
    state_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let config = if cli.config.exists() {
        ServiceConfig::load(&cli.config)?
    } else {
        tracing::warn!(path = %cli.config.display(), "config not found, using defaults");
        ServiceConfig::default()
    };

    let state_dir = cli
        .state_dir
        .or_else(|| dirs::state_dir().map(|dir| dir.join("atlas")))
        .unwrap_or_else(std::env::temp_dir);
    std::fs::create_dir_all(&state_dir)?;
    let _lock = acquire_lock_file(&state_dir.join("atlasd.lock"))
        .map_err(|err| anyhow::anyhow!("another atlasd is running? {err}"))?;

    let catalog = install_catalog(handlers::build_catalog()?)?;
    let daemon = Daemon::start(&config, catalog).await?;

    tokio::signal::ctrl_c().await?;
    tracing::info!("shutting down");
    daemon.shutdown().await;
    Ok(())
}
