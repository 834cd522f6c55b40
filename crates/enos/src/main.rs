//! enos
//!
//! Drives one resource lifecycle phase against JSON request files, with
//! provider transport defaults loaded from `enos.toml`.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use color_eyre::Result;
use enos_core::{CancellationToken, Registry};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use crate::commands::{Command, execute};
use crate::config::Config;

#[derive(Parser)]
#[command(name = "enos")]
#[command(about = "Resolve transports and drive resource lifecycles", long_about = None)]
#[command(version)]
struct Cli {
    /// Provider configuration file
    #[arg(long, global = true, env = "ENOS_CONFIG")]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

/// Logs go to stderr; stdout carries the phase result
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();

    let config = Config::discover(cli.config.as_deref())?;
    init_tracing(&config.log_level, cli.json);

    let mut registry = Registry::default();
    enos_resources::register_all(&mut registry);
    registry.provider().set(config.provider_config()?).await;
    info!(resources = registry.type_names().count(), "enos starting");

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_signal.cancel();
        }
    });

    let outcome = execute(&registry, &cli.command, &cancel).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.body)?);

    Ok(if outcome.failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
