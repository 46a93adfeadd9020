//! Configuration type definitions for Toolweave
//!
//! This module defines all configuration structs used throughout the crate.
//! All types implement serde traits for JSON serialization and have sensible defaults.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main configuration struct for Toolweave
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Agent configuration (model, tokens, iteration bound)
    pub agent: AgentDefaults,
    /// Context window budget
    pub context: ContextConfig,
    /// Reasoning engine connection settings
    pub provider: ProviderConfig,
    /// Tool backend definitions and aggregation policy
    pub backends: BackendsConfig,
    /// Optional question-classification gate
    pub gate: GateConfig,
    /// Session store settings
    pub sessions: SessionsConfig,
    /// Logging output settings
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Default settings applied to every turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentDefaults {
    /// Model identifier passed to the reasoning engine
    pub model: String,
    /// Maximum tokens per reasoning response
    pub max_tokens: u32,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum reasoning/tool-execution cycles per turn
    pub max_tool_iterations: usize,
    /// Replacement for the built-in system instruction
    pub system_prompt: Option<String>,
}

impl Default for AgentDefaults {
    fn default() -> Self {
        Self {
            model: "gpt-4o-mini".to_string(),
            max_tokens: 4096,
            temperature: 0.2,
            max_tool_iterations: 10,
            system_prompt: None,
        }
    }
}

// ============================================================================
// Context Configuration
// ============================================================================

/// History budget enforced before every reasoning step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Maximum number of history messages sent to the reasoning engine.
    pub max_messages: usize,
    /// Maximum estimated tokens of history sent to the reasoning engine.
    pub max_tokens: usize,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: 40,
            max_tokens: 12_000,
        }
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

/// OpenAI-compatible reasoning engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// API key
    pub api_key: Option<String>,
    /// Base URL (defaults to the public OpenAI endpoint)
    pub api_base: Option<String>,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            timeout_secs: 120,
        }
    }
}

// ============================================================================
// Backend Configuration
// ============================================================================

/// How tool-name collisions across backends are resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The backend registered later replaces the earlier tool (logged).
    #[default]
    LastWins,
    /// Any collision is a configuration error.
    Error,
    /// Every tool is exposed as `{backend}_{tool}`.
    Namespace,
}

/// Tool backend definitions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendsConfig {
    /// Liveness probe timeout per backend, in seconds.
    pub probe_timeout_secs: u64,
    /// Tool-name collision policy.
    pub collision: CollisionPolicy,
    /// Register the in-process math backend (`add`, `multiply`, `divide`).
    pub builtin_math: bool,
    /// Remote (MCP) backends.
    pub servers: Vec<BackendServerConfig>,
}

impl Default for BackendsConfig {
    fn default() -> Self {
        Self {
            probe_timeout_secs: 10,
            collision: CollisionPolicy::LastWins,
            builtin_math: true,
            servers: Vec::new(),
        }
    }
}

/// Transport used to reach a remote backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendTransport {
    /// Spawn a local process and speak JSON-RPC over stdin/stdout.
    Stdio,
    /// Streamable HTTP JSON-RPC endpoint.
    Http,
}

/// Configuration for a single remote backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendServerConfig {
    /// Backend name (used in logs and for namespacing).
    pub name: String,
    /// Transport kind.
    pub transport: BackendTransport,
    /// Command to spawn (stdio only).
    #[serde(default)]
    pub command: Option<String>,
    /// Command arguments (stdio only).
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables (stdio only).
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Endpoint URL (http only).
    #[serde(default)]
    pub url: Option<String>,
    /// Extra request headers (http only).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Per-request timeout in seconds (default: 30).
    #[serde(default = "default_backend_timeout")]
    pub timeout_secs: u64,
}

fn default_backend_timeout() -> u64 {
    30
}

// ============================================================================
// Gate Configuration
// ============================================================================

/// Which classifier the gate uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateKind {
    /// Regex keyword classifier for arithmetic questions.
    #[default]
    Keyword,
    /// Ask the reasoning engine for a YES/NO classification.
    Model,
}

/// Question-classification gate settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GateConfig {
    /// Whether the gate runs before reasoning.
    pub enabled: bool,
    /// Classifier kind.
    pub kind: GateKind,
    /// Canned reply for refused turns.
    pub refusal: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            kind: GateKind::Keyword,
            refusal: "Sorry, I can only help with math questions.".to_string(),
        }
    }
}

// ============================================================================
// Session Configuration
// ============================================================================

/// Session store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Mirror sessions to JSON files on disk.
    pub persist: bool,
    /// Directory for session files (defaults to `~/.toolweave/sessions`).
    pub dir: Option<String>,
}

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Multi-line human-readable output.
    Pretty,
    /// Compact single-line output with component fields.
    #[default]
    Component,
    /// JSON lines.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// Optional file for JSON output.
    pub file: Option<String>,
    /// Default filter level when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            file: None,
            level: "info".to_string(),
        }
    }
}
