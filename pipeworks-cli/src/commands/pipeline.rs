//! Pipeline command handlers
//!
//! Handles listing, inspecting, installing, updating and deleting pipelines.
//! Every pipeline is addressed by its id together with the index of the
//! backend it lives on.

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::pipeline::{PipelineKey, PipelineRecord};
use pipeworks_core::dto::pipeline::UpdatePipeline;
use pipeworks_registry::catalog::get_pipeline;
use pipeworks_registry::list_all;
use std::path::Path;

use super::{print_failures, reconciler, report};
use crate::config::Config;

/// Pipeline subcommands
#[derive(Subcommand)]
pub enum PipelineCommands {
    /// List pipelines installed on every backend
    List,
    /// Get pipeline details
    Get {
        /// Pipeline ID
        id: String,

        /// Backend index the pipeline lives on
        #[arg(short, long)]
        backend: BackendIndex,
    },
    /// Install a pipeline the backend fetches from a URL
    Install {
        /// Source URL of the pipeline
        #[arg(short, long)]
        url: String,

        /// Backend index to install on
        #[arg(short, long)]
        backend: BackendIndex,
    },
    /// Install a pipeline by uploading a file
    Upload {
        /// Path to the pipeline file
        #[arg(short, long)]
        file: String,

        /// Backend index to install on
        #[arg(short, long)]
        backend: BackendIndex,
    },
    /// Update pipeline metadata
    Update {
        /// Pipeline ID
        id: String,

        /// Backend index the pipeline lives on
        #[arg(short, long)]
        backend: BackendIndex,

        /// New display name
        #[arg(short, long)]
        name: Option<String>,

        /// New description
        #[arg(short, long)]
        description: Option<String>,

        /// New priority
        #[arg(short, long)]
        priority: Option<i64>,
    },
    /// Delete a pipeline from one backend
    Delete {
        /// Pipeline ID
        id: String,

        /// Backend index the pipeline lives on
        #[arg(short, long)]
        backend: BackendIndex,
    },
}

/// Handle pipeline commands
///
/// Routes pipeline subcommands to their respective handlers.
pub async fn handle_pipeline_command(command: PipelineCommands, config: &Config) -> Result<()> {
    match command {
        PipelineCommands::List => list_pipelines(config).await,
        PipelineCommands::Get { id, backend } => {
            show_pipeline(config, PipelineKey::new(backend, id)).await
        }
        PipelineCommands::Install { url, backend } => install_from_url(config, &url, backend).await,
        PipelineCommands::Upload { file, backend } => install_from_file(config, &file, backend).await,
        PipelineCommands::Update {
            id,
            backend,
            name,
            description,
            priority,
        } => {
            let update = UpdatePipeline {
                name,
                description,
                priority,
            };
            update_pipeline(config, PipelineKey::new(backend, id), update).await
        }
        PipelineCommands::Delete { id, backend } => {
            delete_pipeline(config, PipelineKey::new(backend, id)).await
        }
    }
}

/// List pipelines on every backend
async fn list_pipelines(config: &Config) -> Result<()> {
    let registry = config.build_registry().await?;
    let listing = list_all(&registry).await;

    if listing.records.is_empty() {
        println!("{}", "No pipelines found.".yellow());
    } else {
        println!(
            "{}",
            format!("Found {} pipeline(s):", listing.records.len()).bold()
        );
        println!();
        for record in &listing.records {
            print_pipeline_summary(record);
        }
    }

    if !listing.is_complete() {
        println!("{}", "Backends that failed to list:".yellow().bold());
        print_failures(&listing.unreachable);
    }

    Ok(())
}

/// Get and display a single pipeline
async fn show_pipeline(config: &Config, key: PipelineKey) -> Result<()> {
    let registry = config.build_registry().await?;
    let record = get_pipeline(&registry, &key).await?;

    print_pipeline_details(&record);

    Ok(())
}

async fn install_from_url(config: &Config, url: &str, backend: BackendIndex) -> Result<()> {
    let mut reconciler = reconciler(config).await?;
    let outcome = reconciler.install_from_url(url, backend).await;

    report(outcome, |record| {
        println!("{}", "✓ Pipeline installed successfully!".green().bold());
        print_pipeline_details(&record);
    })
}

async fn install_from_file(config: &Config, path: &str, backend: BackendIndex) -> Result<()> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read pipeline file: {}", path))?;
    let filename = Path::new(path)
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Invalid pipeline file name: {}", path))?;

    let mut reconciler = reconciler(config).await?;
    let outcome = reconciler.install_from_file(bytes, filename, backend).await;

    report(outcome, |record| {
        println!("{}", "✓ Pipeline uploaded successfully!".green().bold());
        print_pipeline_details(&record);
    })
}

async fn update_pipeline(config: &Config, key: PipelineKey, update: UpdatePipeline) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update: pass --name, --description or --priority");
    }

    let mut reconciler = reconciler(config).await?;
    let outcome = reconciler.update(&key, &update).await;

    report(outcome, |record| {
        println!("{}", "✓ Pipeline updated successfully!".green().bold());
        print_pipeline_details(&record);
    })
}

async fn delete_pipeline(config: &Config, key: PipelineKey) -> Result<()> {
    let mut reconciler = reconciler(config).await?;
    let outcome = reconciler.delete(&key).await;

    report(outcome, |()| {
        println!(
            "{}",
            format!("✓ Pipeline {} deleted successfully!", key)
                .green()
                .bold()
        );
    })
}

/// Print a pipeline summary
fn print_pipeline_summary(record: &PipelineRecord) {
    println!("  {} {}", "▸".cyan(), record.display_name.bold());
    println!("    ID:        {}", record.id.dimmed());
    println!("    Backend:   {}", record.backend_index.to_string().dimmed());
    if let Some(source) = record.source_type {
        println!("    Source:    {}", source.to_string().dimmed());
    }
    println!(
        "    Installed: {}",
        record
            .installed_at
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
            .dimmed()
    );
    println!();
}

/// Print detailed pipeline information
fn print_pipeline_details(record: &PipelineRecord) {
    println!("{}", "Pipeline Details:".bold());
    println!("  ID:        {}", record.id.cyan());
    println!("  Name:      {}", record.display_name.bold());
    println!("  Backend:   {}", record.backend_index);
    if let Some(source) = record.source_type {
        println!("  Source:    {}", source);
    }
    println!(
        "  Installed: {}",
        record.installed_at.format("%Y-%m-%d %H:%M:%S")
    );
}
