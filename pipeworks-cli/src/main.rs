//! Pipeworks CLI
//!
//! Command-line interface for managing pipelines across several backends.

mod commands;
mod config;

use anyhow::Result;
use clap::Parser;
use commands::{Commands, handle_command};
use config::{Config, parse_backend};
use pipeworks_core::domain::backend::BackendConnection;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "pipeworks")]
#[command(about = "Multi-backend pipeline registry CLI", long_about = None)]
struct Cli {
    /// Backend connection as INDEX=URL (repeatable)
    #[arg(
        long = "backend",
        env = "PIPEWORKS_BACKENDS",
        value_delimiter = ',',
        value_parser = parse_backend
    )]
    backends: Vec<BackendConnection>,

    /// Gateway URL to discover backends from
    #[arg(long = "gateway", env = "PIPEWORKS_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "PIPEWORKS_TIMEOUT", default_value = "30")]
    timeout: u64,

    #[command(subcommand)]
    command: Commands,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pipeworks=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config = Config {
        backends: cli.backends,
        gateway_url: cli.gateway_url,
        timeout: Duration::from_secs(cli.timeout),
    };

    handle_command(cli.command, &config).await
}
