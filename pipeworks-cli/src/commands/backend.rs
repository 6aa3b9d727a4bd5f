//! Backend command handlers

use anyhow::Result;
use colored::*;

use crate::config::Config;

/// List the configured (or discovered) backends
pub async fn list_backends(config: &Config) -> Result<()> {
    let registry = config.build_registry().await?;

    if registry.is_empty() {
        println!("{}", "No backends registered.".yellow());
        return Ok(());
    }

    println!(
        "{}",
        format!("Found {} backend(s):", registry.len()).bold()
    );
    for connection in registry.connections() {
        println!(
            "  {} {}  {}",
            "▸".cyan(),
            format!("#{}", connection.index).bold(),
            connection.base_url.dimmed()
        );
    }

    Ok(())
}
