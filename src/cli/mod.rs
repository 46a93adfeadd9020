//! CLI module — command parsing and dispatch
//!
//! All CLI logic lives here. `main.rs` calls `cli::run()`.

pub mod chat;
pub mod common;
pub mod config;
pub mod tools;

use std::path::PathBuf;

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};

#[derive(Parser)]
#[command(name = "toolweave")]
#[command(version)]
#[command(about = "Tool-using conversational agent", long_about = None)]
struct Cli {
    /// Config file (default: ~/.toolweave/config.json)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with the agent (interactive unless --message is given)
    Chat {
        /// Session identifier; turns with the same id share history
        #[arg(short, long, default_value = "cli:default")]
        session: String,
        /// Direct message to process (non-interactive mode)
        #[arg(short, long)]
        message: Option<String>,
    },
    /// Validate backends and list the aggregated tools
    Tools,
    /// Validate configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Check configuration for errors
    Check,
}

/// Parse arguments and run the selected command.
pub async fn run() -> Result<()> {
    // `.env` is optional; a missing file is not an error.
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging from config (format, level, optional file output).
    // Fall back to defaults if the config file is missing or unreadable.
    let logging_cfg = common::load_config(cli.config.as_deref())
        .map(|c| c.logging)
        .unwrap_or_default();
    toolweave::utils::logging::init_logging(&logging_cfg);

    match cli.command {
        None => {
            let mut cmd = Cli::command();
            cmd.print_help()?;
            println!();
        }
        Some(Commands::Chat { session, message }) => {
            chat::cmd_chat(cli.config.as_deref(), &session, message).await?;
        }
        Some(Commands::Tools) => {
            tools::cmd_tools(cli.config.as_deref()).await?;
        }
        Some(Commands::Config { action }) => {
            config::cmd_config(cli.config.as_deref(), action)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_chat() {
        let cli = Cli::try_parse_from(["toolweave", "chat", "-s", "web:1", "-m", "Add 3 and 4"])
            .unwrap();
        match cli.command {
            Some(Commands::Chat { session, message }) => {
                assert_eq!(session, "web:1");
                assert_eq!(message.as_deref(), Some("Add 3 and 4"));
            }
            _ => panic!("expected chat"),
        }
    }

    #[test]
    fn test_cli_global_config_flag() {
        let cli = Cli::try_parse_from(["toolweave", "tools", "-c", "/tmp/tw.json"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tw.json")));
        assert!(matches!(cli.command, Some(Commands::Tools)));
    }

    #[test]
    fn test_cli_config_check() {
        let cli = Cli::try_parse_from(["toolweave", "config", "check"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Commands::Config {
                action: ConfigAction::Check
            })
        ));
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }
}
