// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Loom Orchestrator CLI
//!
//! `loom serve` loads and validates an `AppConfig`, wires the MCP composite,
//! provider registry, A2A gateway and conversation store it describes, and
//! serves the REST façade (§6) on the configured host/port.

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use colored::Colorize;
use loom_cli::serve;
use loom_orchestrator_core::infrastructure::config_loader;

/// Loom agent orchestrator - run a configured agent instance.
#[derive(Parser)]
#[command(name = "loom")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "LOOM_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Load the configured agent and serve its REST/A2A surface
    Serve {
        /// Path to the agent configuration file
        #[arg(
            short,
            long,
            env = "ORCHESTRATOR_CONFIG_PATH",
            value_name = "FILE"
        )]
        config: Option<PathBuf>,

        /// Override the port set in the configuration file
        #[arg(long, value_name = "PORT")]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let result = match cli.command {
        Commands::Serve { config, port } => run_serve(config, port).await,
    };

    if let Err(err) = &result {
        eprintln!("{} {err:#}", "error:".red().bold());
        std::process::exit(1);
    }

    Ok(())
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let config = config_loader::resolve_and_load(config_path.as_deref())
        .context("failed to load agent configuration")?;
    println!(
        "{} loading agent {}",
        "loom:".green().bold(),
        config.name.bold()
    );
    serve::run(config, port).await
}

fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();

    Ok(())
}
