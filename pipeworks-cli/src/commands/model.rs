//! Model command handlers

use anyhow::Result;
use colored::*;
use pipeworks_registry::RefreshOutcome;

use super::{print_failures, reconciler};
use crate::config::Config;

/// Refresh the catalog and print every model, grouped by pipeline
pub async fn list_models(config: &Config) -> Result<()> {
    let mut reconciler = reconciler(config).await?;
    let refresh = reconciler.refresh().await;

    let Some(view) = reconciler.view() else {
        return Ok(());
    };

    if view.models.is_empty() {
        println!("{}", "No models found.".yellow());
    } else {
        println!("{}", format!("Found {} model(s):", view.models.len()).bold());
        println!();
        for record in &view.records {
            let key = record.key();
            let models: Vec<_> = view.models_of(&key).collect();
            if models.is_empty() {
                continue;
            }
            let marker = if view.is_unverified(&key) {
                " (unverified)".yellow().to_string()
            } else {
                String::new()
            };
            println!(
                "  {} {} {}{}",
                "▸".cyan(),
                record.display_name.bold(),
                format!("({})", key).dimmed(),
                marker
            );
            for model in models {
                println!("    - {} {}", model.model_id.cyan(), model.display_name.dimmed());
            }
        }
    }

    if let RefreshOutcome::Partial(failures) = &refresh {
        println!();
        println!("{}", "Some targets did not answer:".yellow().bold());
        print_failures(failures);
    }

    Ok(())
}
