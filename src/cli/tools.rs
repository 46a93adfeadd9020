//! Tools command handler: validate backends and list what they expose.

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};

use toolweave::tools::{backends_from_config, validate_backends, ToolRegistry};

use super::common::load_config;

pub(crate) async fn cmd_tools(config_path: Option<&Path>) -> Result<()> {
    let config = load_config(config_path)?;
    config.validate().with_context(|| "Invalid configuration")?;

    let backends = backends_from_config(&config.backends)?;
    let configured = backends.len();
    let probe_timeout = Duration::from_secs(config.backends.probe_timeout_secs);
    let validated = validate_backends(backends, probe_timeout).await?;

    println!("Backends ({} of {} reachable)", validated.len(), configured);
    println!("{}", "=".repeat(60));
    for backend in &validated {
        println!(
            "  [+] {} ({}, {} tools)",
            backend.name(),
            backend.backend.transport(),
            backend.tools.len()
        );
    }
    println!();

    let registry = ToolRegistry::aggregate(validated, config.backends.collision)?;
    println!("Available Tools ({} total)", registry.len());
    println!("{}", "=".repeat(60));
    println!();
    for entry in registry.entries() {
        println!("  {}  [{}]", entry.name, entry.backend_name());
        if !entry.spec.description.is_empty() {
            println!("      {}", entry.spec.description);
        }
    }

    Ok(())
}
