//! Error types for Toolweave
//!
//! This module defines all error types used throughout the crate. Uses
//! `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.
//!
//! The variants follow the recovery policy of the engine:
//!
//! - `Config` is fatal and blocks startup (including "zero tool backends").
//! - `Backend` is raised by a single backend probe and recovered by the
//!   registry, which logs it and drops the backend.
//! - `Tool` never escapes a turn; the engine folds it into a tool-result message.
//! - `Provider` / `ProviderTyped`, `LoopLimit` and `Cancelled` abort the current
//!   turn without committing any of its messages.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Provides categorization of reasoning-engine HTTP errors so callers can
/// tell transient failures from permanent ones without string matching.
#[derive(Debug)]
pub enum ProviderError {
    /// 401 — Invalid API key or authentication failure
    Auth(String),
    /// 429 — Rate limit or quota exceeded
    RateLimit(String),
    /// 402 — Payment required or billing issue
    Billing(String),
    /// 500/502/503/504 — Server-side errors
    ServerError(String),
    /// 400 — Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404 — Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request could be retried.
    ///
    /// The engine itself never retries; this is exposed for callers of
    /// `submit_turn` that want to resubmit.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_) | ProviderError::ServerError(_) | ProviderError::Timeout(_)
        )
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Timeout(_) => None,
            ProviderError::Unknown(_) => None,
        }
    }
}

impl From<ProviderError> for WeaveError {
    fn from(err: ProviderError) -> Self {
        WeaveError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for Toolweave operations.
#[derive(Error, Debug)]
pub enum WeaveError {
    /// Configuration errors (invalid config, no usable tool backend, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// A single tool backend failed its liveness probe or listing.
    #[error("Backend '{backend}' failed: {message}")]
    Backend { backend: String, message: String },

    /// Reasoning engine errors (transport failures, malformed responses, etc.)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with HTTP classification.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session management errors (invalid state, persistence failures, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// A message violates the conversation invariants.
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// The reasoning/tool cycle exceeded the configured iteration bound.
    #[error("Turn aborted: exceeded {iterations} reasoning/tool iterations")]
    LoopLimit { iterations: usize },

    /// The turn was cancelled between suspension points.
    #[error("Turn cancelled")]
    Cancelled,

    /// MCP (Model Context Protocol) transport or protocol errors
    #[error("MCP error: {0}")]
    Mcp(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl WeaveError {
    /// Whether this error only affects the current turn.
    ///
    /// Turn-level failures are reported to the caller as a single error
    /// message; everything else is an operator-facing problem.
    pub fn is_turn_failure(&self) -> bool {
        matches!(
            self,
            WeaveError::Provider(_)
                | WeaveError::ProviderTyped(_)
                | WeaveError::LoopLimit { .. }
                | WeaveError::Cancelled
                | WeaveError::Http(_)
        )
    }
}

/// A specialized `Result` type for Toolweave operations.
pub type Result<T> = std::result::Result<T, WeaveError>;
