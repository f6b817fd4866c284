// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The RPC server: a pool of worker processes plus their supervisor.
//!
//! The hidden `worker` subcommand is the entry point of the supervised
//! processes themselves; the supervisor spawns the current executable with
//! it.

use atlas_cli::{handlers, init_tracing, parse_consumer_pairs};
use atlas_core::ServiceConfig;
use atlas_worker::{install_catalog, PoolConfig, PoolSupervisor, WorkerHost};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "atlas-rpc-server", about = "Atlas worker pool")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
    /// Routing-key/instance-count pairs, e.g. `--consumers consumer_A 2`.
    #[arg(long, num_args = 2.., value_name = "ROUTING_KEY COUNT")]
    consumers: Vec<String>,
    /// Path to the service configuration.
    #[arg(long, default_value = "atlas.toml")]
    config: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// One supervised worker process (spawned by the supervisor).
    #[command(hide = true)]
    Worker {
        #[arg(long)]
        routing_key: String,
        #[arg(long)]
        instance: usize,
        #[arg(long)]
        amqp_url: String,
        #[arg(long)]
        control_socket: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let catalog = install_catalog(handlers::build_catalog()?)?;

    match cli.command {
        Some(Command::Worker { routing_key, instance, amqp_url, control_socket }) => {
            WorkerHost::run(&catalog, &routing_key, instance, &amqp_url, &control_socket)
                .await?;
        }
        None => {
            let consumers = parse_consumer_pairs(&cli.consumers)?;
            let config = if cli.config.exists() {
                ServiceConfig::load(&cli.config)?
            } else {
                ServiceConfig::default()
            };

            let pool = PoolSupervisor::start(
                PoolConfig {
                    amqp_url: config.amqp_url.clone(),
                    socket_dir: std::env::temp_dir().join("atlas-workers"),
                    restart_delay: config.restart_delay(),
                    consumers,
                },
                &catalog,
            )
            .await?;

            tracing::info!("server is ready");
            tokio::signal::ctrl_c().await?;
            tracing::info!("stopping worker pool");
            pool.stop(Duration::from_secs(10)).await;
        }
    }
    Ok(())
}
