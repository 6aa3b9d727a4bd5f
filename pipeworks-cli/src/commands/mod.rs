//! Commands module
//!
//! Defines all CLI commands, their handlers and the shared report output.

mod backend;
mod model;
mod pipeline;
mod valves;

pub use pipeline::PipelineCommands;
pub use valves::ValveCommands;

use anyhow::Result;
use clap::Subcommand;
use colored::*;
use pipeworks_registry::{
    MutationReport, PipelineError, Reconciler, RefreshOutcome, TargetFailure,
};
use std::sync::Arc;

use crate::config::Config;

/// Top-level CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// List the configured backends
    Backends,
    /// Pipeline management
    Pipeline {
        #[command(subcommand)]
        command: PipelineCommands,
    },
    /// List the models exposed by every installed pipeline
    Models,
    /// Valve management
    Valves {
        #[command(subcommand)]
        command: ValveCommands,
    },
}

/// Handle a CLI command
///
/// Routes the command to the appropriate handler module.
pub async fn handle_command(command: Commands, config: &Config) -> Result<()> {
    match command {
        Commands::Backends => backend::list_backends(config).await,
        Commands::Pipeline { command } => pipeline::handle_pipeline_command(command, config).await,
        Commands::Models => model::list_models(config).await,
        Commands::Valves { command } => valves::handle_valve_command(command, config).await,
    }
}

/// Reconciler over the configured backends
async fn reconciler(config: &Config) -> Result<Reconciler> {
    let registry = config.build_registry().await?;
    Ok(Reconciler::new(Arc::new(registry)))
}

/// Parse a single key=value pair
fn parse_key_val(s: &str) -> Result<(String, String)> {
    let pos = s
        .find('=')
        .ok_or_else(|| anyhow::anyhow!("invalid KEY=value: no `=` found in `{}`", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Print the mutation outcome, then the refresh outcome
///
/// A failed mutation is returned as the command's error after both parts
/// have been printed.
fn report<T>(report: MutationReport<T>, on_success: impl FnOnce(T)) -> Result<()> {
    let MutationReport { outcome, refresh } = report;

    let failure = match outcome {
        Ok(value) => {
            on_success(value);
            None
        }
        Err(err) => {
            print_error(&err);
            Some(err)
        }
    };

    print_refresh(&refresh);

    match failure {
        Some(err) => Err(err.into()),
        None => Ok(()),
    }
}

/// Print an error, expanding structured backend details
fn print_error(err: &PipelineError) {
    println!("{} {}", "✗".red().bold(), err.to_string().red());

    let structured = match err {
        PipelineError::Client(client) => client.detail().filter(|detail| detail.is_structured()),
        _ => None,
    };
    if let Some(detail) = structured {
        println!("{}", "  Detail:".bold());
        for line in detail.render_pretty().lines() {
            println!("    {}", line.dimmed());
        }
    }
}

fn print_refresh(refresh: &RefreshOutcome) {
    match refresh {
        RefreshOutcome::Skipped => {}
        RefreshOutcome::Complete => println!("{}", "  Catalog refreshed.".dimmed()),
        RefreshOutcome::Partial(failures) => {
            println!("{}", "  Catalog refreshed partially:".yellow());
            print_failures(failures);
        }
    }
}

/// Print per-target failures of a tolerant join
fn print_failures(failures: &[TargetFailure]) {
    for failure in failures {
        println!(
            "    {} {}: {}",
            "!".yellow().bold(),
            failure.target.to_string().yellow(),
            failure.error.to_string().dimmed()
        );
    }
}
