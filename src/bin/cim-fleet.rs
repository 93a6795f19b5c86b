// Copyright (c) 2025 - Cowboy AI, Inc.
//! Fleet dispatcher CLI
//!
//! Runs one mode against every node (or host) in the configured topology.
//!
//! Run with: cargo run --bin cim-fleet -- [--config fleet.toml] [--dry-run] [--all-hosts] <mode>
//!
//! Modes: server, sync, up, addpeer, subshard, broadcastcollation

use anyhow::{Context, Result};
use cim_fleet::config::{CONFIG_ENV, DEFAULT_CONFIG_PATH};
use cim_fleet::{FleetConfig, FleetService, Mode, OpenSshTransport, SyncScope};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "cim-fleet", version, about = "Drive a p2p test network over SSH")]
struct Cli {
    /// Fleet configuration file
    #[arg(long, short, env = CONFIG_ENV, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Print the commands each target would receive and exit
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print the plan as JSON
    #[arg(long, requires = "dry_run")]
    json: bool,

    /// With sync, build on every registered host, not only those running nodes
    #[arg(long)]
    all_hosts: bool,

    /// server | sync | up | addpeer | subshard | broadcastcollation
    mode: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    let mode: Mode = cli.mode.parse()?;

    info!("📋 Loading fleet configuration from {}", cli.config.display());
    let config = FleetConfig::load(&cli.config)
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;
    info!(
        "✅ {} hosts, {} nodes",
        config.registry.len(),
        config.topology.node_count()
    );

    let config = Arc::new(config);
    let transport = Arc::new(OpenSshTransport::new(config.ssh.clone()));
    let scope = if cli.all_hosts {
        SyncScope::Registry
    } else {
        SyncScope::HostsInUse
    };
    let service = FleetService::new(config, transport).with_sync_scope(scope);

    if cli.dry_run {
        let plan = service
            .plan(mode)
            .with_context(|| format!("Failed to plan mode {mode}"))?;
        info!("🔍 Dry run: {} targets for {}", plan.len(), mode);
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&plan.describe())?);
        } else {
            for entry in plan.describe() {
                println!("{entry}");
            }
        }
        return Ok(());
    }

    let total = service
        .run(mode)
        .await
        .with_context(|| format!("Mode {mode} failed"))?;
    info!("🎉 {} completed on {} targets", mode, total);
    Ok(())
}
