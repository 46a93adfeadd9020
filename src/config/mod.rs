//! Configuration management for Toolweave
//!
//! Configuration is loaded from `~/.toolweave/config.json` with environment
//! variable overrides of the form `TOOLWEAVE_SECTION_KEY`.

mod types;

pub use types::*;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::error::{Result, WeaveError};

impl Config {
    /// Returns the Toolweave configuration directory path (~/.toolweave)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".toolweave")
    }

    /// Returns the path to the config file (~/.toolweave/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// If the config file doesn't exist, returns default configuration.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();

        Ok(config)
    }

    /// Directory used when session persistence is enabled.
    pub fn sessions_dir(&self) -> PathBuf {
        match &self.sessions.dir {
            Some(dir) => PathBuf::from(dir),
            None => Self::dir().join("sessions"),
        }
    }

    /// Apply environment variable overrides to the configuration.
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("TOOLWEAVE_AGENT_MODEL") {
            self.agent.model = val;
        }
        if let Ok(val) = std::env::var("TOOLWEAVE_AGENT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tokens = v;
            }
        }
        if let Ok(val) = std::env::var("TOOLWEAVE_AGENT_TEMPERATURE") {
            if let Ok(v) = val.parse() {
                self.agent.temperature = v;
            }
        }
        if let Ok(val) = std::env::var("TOOLWEAVE_AGENT_MAX_TOOL_ITERATIONS") {
            if let Ok(v) = val.parse() {
                self.agent.max_tool_iterations = v;
            }
        }

        if let Ok(val) = std::env::var("TOOLWEAVE_CONTEXT_MAX_MESSAGES") {
            if let Ok(v) = val.parse() {
                self.context.max_messages = v;
            }
        }
        if let Ok(val) = std::env::var("TOOLWEAVE_CONTEXT_MAX_TOKENS") {
            if let Ok(v) = val.parse() {
                self.context.max_tokens = v;
            }
        }

        // Provider key: our own variable first, then the conventional one.
        if let Ok(val) = std::env::var("TOOLWEAVE_PROVIDER_API_KEY") {
            self.provider.api_key = Some(val);
        } else if self.provider.api_key.is_none() {
            if let Ok(val) = std::env::var("OPENAI_API_KEY") {
                self.provider.api_key = Some(val);
            }
        }
        if let Ok(val) = std::env::var("TOOLWEAVE_PROVIDER_API_BASE") {
            self.provider.api_base = Some(val);
        }

        if let Ok(val) = std::env::var("TOOLWEAVE_BACKENDS_PROBE_TIMEOUT_SECS") {
            if let Ok(v) = val.parse() {
                self.backends.probe_timeout_secs = v;
            }
        }

        if let Ok(val) = std::env::var("TOOLWEAVE_GATE_ENABLED") {
            if let Ok(v) = val.parse() {
                self.gate.enabled = v;
            }
        }

        if let Ok(val) = std::env::var("TOOLWEAVE_LOGGING_LEVEL") {
            self.logging.level = val;
        }
    }

    /// Check the configuration for problems that must block startup.
    pub fn validate(&self) -> Result<()> {
        if self.agent.max_tool_iterations == 0 {
            return Err(WeaveError::Config(
                "agent.max_tool_iterations must be at least 1".into(),
            ));
        }
        if self.context.max_messages == 0 || self.context.max_tokens == 0 {
            return Err(WeaveError::Config(
                "context budget must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for server in &self.backends.servers {
            if server.name.trim().is_empty() {
                return Err(WeaveError::Config("backend with empty name".into()));
            }
            if !seen.insert(server.name.as_str()) {
                return Err(WeaveError::Config(format!(
                    "duplicate backend name '{}'",
                    server.name
                )));
            }
            match server.transport {
                BackendTransport::Stdio if server.command.is_none() => {
                    return Err(WeaveError::Config(format!(
                        "stdio backend '{}' has no command",
                        server.name
                    )));
                }
                BackendTransport::Http if server.url.is_none() => {
                    return Err(WeaveError::Config(format!(
                        "http backend '{}' has no url",
                        server.name
                    )));
                }
                _ => {}
            }
        }

        if !self.backends.builtin_math && self.backends.servers.is_empty() {
            return Err(WeaveError::Config(
                "no tool backends configured".into(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.agent.max_tool_iterations, 10);
        assert_eq!(config.backends.collision, CollisionPolicy::LastWins);
        assert!(config.backends.builtin_math);
        assert!(!config.gate.enabled);
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.context.max_messages, 40);
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{
                "backends": {{
                    "collision": "namespace",
                    "servers": [
                        {{"name": "weather", "transport": "stdio", "command": "python", "args": ["weather.py"]}},
                        {{"name": "db", "transport": "http", "url": "http://127.0.0.1:8001"}}
                    ]
                }},
                "gate": {{"enabled": true}}
            }}"#
        )
        .unwrap();

        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.backends.collision, CollisionPolicy::Namespace);
        assert_eq!(config.backends.servers.len(), 2);
        assert_eq!(config.backends.servers[0].transport, BackendTransport::Stdio);
        assert_eq!(config.backends.servers[1].timeout_secs, 30);
        assert!(config.gate.enabled);
        assert_eq!(config.gate.kind, GateKind::Keyword);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_http_without_url() {
        let mut config = Config::default();
        config.backends.servers.push(BackendServerConfig {
            name: "remote".into(),
            transport: BackendTransport::Http,
            command: None,
            args: vec![],
            env: Default::default(),
            url: None,
            headers: Default::default(),
            timeout_secs: 30,
        });
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("has no url"));
    }

    #[test]
    fn test_validate_rejects_duplicate_names() {
        let server = BackendServerConfig {
            name: "dup".into(),
            transport: BackendTransport::Stdio,
            command: Some("cat".into()),
            args: vec![],
            env: Default::default(),
            url: None,
            headers: Default::default(),
            timeout_secs: 30,
        };
        let mut config = Config::default();
        config.backends.servers = vec![server.clone(), server];
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_no_backends() {
        let mut config = Config::default();
        config.backends.builtin_math = false;
        assert!(matches!(config.validate(), Err(WeaveError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let mut config = Config::default();
        config.agent.max_tool_iterations = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_sessions_dir_override() {
        let mut config = Config::default();
        config.sessions.dir = Some("/tmp/tw-sessions".into());
        assert_eq!(config.sessions_dir(), PathBuf::from("/tmp/tw-sessions"));
    }
}
