//! Config check command handler.

use std::path::Path;

use anyhow::Result;

use toolweave::config::{BackendTransport, Config};

use super::common::load_config;
use super::ConfigAction;

/// Validate configuration file.
pub(crate) fn cmd_config(path: Option<&Path>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => {
            let config_path = path.map(Path::to_path_buf).unwrap_or_else(Config::path);
            println!("Config file: {}", config_path.display());
            if !config_path.exists() {
                println!("[OK] No config file found (using defaults)");
            }

            let config = match load_config(path) {
                Ok(config) => config,
                Err(e) => {
                    println!("[ERROR] {:#}", e);
                    return Ok(());
                }
            };

            if config.provider.api_key.is_none() {
                println!("[WARN] No API key (set TOOLWEAVE_PROVIDER_API_KEY or OPENAI_API_KEY)");
            }
            if config.backends.builtin_math {
                println!("[OK] Built-in math backend enabled");
            }
            for server in &config.backends.servers {
                let target = match server.transport {
                    BackendTransport::Stdio => server.command.clone().unwrap_or_default(),
                    BackendTransport::Http => server.url.clone().unwrap_or_default(),
                };
                println!("[OK] Backend '{}' ({:?}): {}", server.name, server.transport, target);
            }

            match config.validate() {
                Ok(()) => println!("\nConfiguration looks good!"),
                Err(e) => println!("\n[ERROR] {}", e),
            }
        }
    }
    Ok(())
}
