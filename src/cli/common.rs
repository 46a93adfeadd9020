//! Shared CLI helpers used across multiple command handlers.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use toolweave::agent::AgentLoop;
use toolweave::config::Config;
use toolweave::providers::provider_from_config;
use toolweave::session::SessionManager;
use toolweave::tools::backends_from_config;
use toolweave::utils::metrics::UsageMetrics;

/// Load configuration from `path`, or from the default location.
pub(crate) fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from_path(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))?,
        None => Config::load().with_context(|| "Failed to load configuration")?,
    };
    Ok(config)
}

/// Session store as configured: on disk when persistence is on.
pub(crate) fn create_sessions(config: &Config) -> Result<SessionManager> {
    if config.sessions.persist {
        let dir = config.sessions_dir();
        info!(dir = %dir.display(), "Persisting sessions");
        SessionManager::with_path(dir).with_context(|| "Failed to open session directory")
    } else {
        Ok(SessionManager::new_memory())
    }
}

/// Validate config, probe backends and build the engine.
pub(crate) async fn create_agent(config: Config) -> Result<AgentLoop> {
    config.validate().with_context(|| "Invalid configuration")?;

    let provider = Arc::new(provider_from_config(&config)?);
    let backends = backends_from_config(&config.backends)?;
    let sessions = create_sessions(&config)?;

    let agent = AgentLoop::from_backends(config, sessions, provider, backends)
        .await
        .with_context(|| "Failed to start agent")?
        .with_metrics(Arc::new(UsageMetrics::new()));
    Ok(agent)
}
