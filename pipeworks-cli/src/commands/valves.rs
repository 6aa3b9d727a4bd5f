//! Valve command handlers

use anyhow::{Context, Result, bail};
use clap::Subcommand;
use colored::*;
use pipeworks_core::domain::backend::BackendIndex;
use pipeworks_core::domain::pipeline::PipelineKey;
use pipeworks_core::domain::valve::{ValveConfig, ValveParameters};
use pipeworks_registry::get_valves;
use serde_json::Value;

use super::{parse_key_val, reconciler, report};
use crate::config::Config;

/// Valve subcommands
#[derive(Subcommand)]
pub enum ValveCommands {
    /// Show the current valves of a pipeline
    Get {
        /// Pipeline ID
        id: String,

        /// Backend index the pipeline lives on
        #[arg(short, long)]
        backend: BackendIndex,
    },
    /// Fetch the valves, change some parameters and save them
    Set {
        /// Pipeline ID
        id: String,

        /// Backend index the pipeline lives on
        #[arg(short, long)]
        backend: BackendIndex,

        /// Parameters as key=value pairs; values are read as JSON when possible
        #[arg(short, long, value_parser = parse_key_val)]
        param: Vec<(String, String)>,
    },
    /// Replace all valves with the contents of a JSON file
    Replace {
        /// Pipeline ID
        id: String,

        /// Backend index the pipeline lives on
        #[arg(short, long)]
        backend: BackendIndex,

        /// Path to a JSON object with the new valves
        #[arg(short, long)]
        file: String,
    },
}

/// Handle valve commands
pub async fn handle_valve_command(command: ValveCommands, config: &Config) -> Result<()> {
    match command {
        ValveCommands::Get { id, backend } => show_valves(config, PipelineKey::new(backend, id)).await,
        ValveCommands::Set { id, backend, param } => {
            edit_valves(config, PipelineKey::new(backend, id), param).await
        }
        ValveCommands::Replace { id, backend, file } => {
            replace_valves(config, PipelineKey::new(backend, id), &file).await
        }
    }
}

async fn show_valves(config: &Config, key: PipelineKey) -> Result<()> {
    let registry = config.build_registry().await?;
    let valves = get_valves(&registry, &key).await?;

    print_valves(&valves);
    Ok(())
}

async fn edit_valves(config: &Config, key: PipelineKey, params: Vec<(String, String)>) -> Result<()> {
    if params.is_empty() {
        bail!("Nothing to set: pass at least one --param key=value");
    }

    let mut reconciler = reconciler(config).await?;
    let mut editor = reconciler.open_valves(key.clone());
    editor
        .fetch(reconciler.registry())
        .await
        .with_context(|| format!("Failed to fetch valves of {}", key))?;

    for (name, value) in params {
        editor.set(name, parse_value(&value))?;
    }

    let outcome = reconciler.save_valves(&mut editor).await;
    report(outcome, |valves| {
        println!("{}", "✓ Valves saved successfully!".green().bold());
        print_valves(&valves);
    })
}

async fn replace_valves(config: &Config, key: PipelineKey, path: &str) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read valves file: {}", path))?;
    let parameters: ValveParameters = serde_json::from_str(&content)
        .with_context(|| format!("Valves file must contain a JSON object: {}", path))?;

    let mut reconciler = reconciler(config).await?;
    let outcome = reconciler.set_valves(&key, parameters).await;

    report(outcome, |valves| {
        println!("{}", "✓ Valves replaced successfully!".green().bold());
        print_valves(&valves);
    })
}

/// `5` -> number, `true` -> bool, `hello` -> string
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_valves(valves: &ValveConfig) {
    println!(
        "{} {}",
        "Valves of".bold(),
        valves.key().to_string().cyan()
    );
    if valves.parameters.is_empty() {
        println!("  {}", "(none)".dimmed());
        return;
    }
    for (name, value) in &valves.parameters {
        println!("  {}: {}", name.bold(), value.to_string().dimmed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("5"), json!(5));
        assert_eq!(parse_value("0.7"), json!(0.7));
        assert_eq!(parse_value("true"), json!(true));
        assert_eq!(parse_value("[1,2]"), json!([1, 2]));
        assert_eq!(parse_value("gpt-4o"), json!("gpt-4o"));
        assert_eq!(parse_value("\"5\""), json!("5"));
    }
}
