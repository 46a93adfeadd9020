//! Tool types for Toolweave
//!
//! This module defines the `Tool` trait implemented by in-process tools, the
//! `ToolOutput` every invocation produces, and the `ToolContext` threaded
//! through each call.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// Result of one tool invocation, as fed back to the reasoning engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Content sent to the reasoning engine as the tool result.
    pub for_llm: String,
    /// Whether this result represents an error condition.
    pub is_error: bool,
}

impl ToolOutput {
    /// Successful result.
    pub fn llm_only(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: false,
        }
    }

    /// Error result. The reasoning engine sees the error text.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: true,
        }
    }
}

/// Trait that in-process tools implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use toolweave::tools::{Tool, ToolContext, ToolOutput};
/// use toolweave::error::Result;
///
/// struct PingTool;
///
/// #[async_trait]
/// impl Tool for PingTool {
///     fn name(&self) -> &str { "ping" }
///     fn description(&self) -> &str { "Replies with pong" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({ "type": "object", "properties": {} })
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
///         Ok(ToolOutput::llm_only("pong"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Tool name, unique within its backend.
    fn name(&self) -> &str;

    /// Description shown to the reasoning engine.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Returning `Err` is fine; the registry turns it into an error result.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;
}

/// Context provided to tools during execution.
///
/// Carries the session explicitly so no tool needs ambient state to know
/// which conversation it is serving.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// Session the call belongs to
    pub session_id: Option<String>,
    /// Identifier of the tool call being served
    pub call_id: Option<String>,
}

impl ToolContext {
    /// Create a new empty tool context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the session identifier.
    ///
    /// # Example
    /// ```
    /// use toolweave::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_session("web:42").with_call("call_1");
    /// assert_eq!(ctx.session_id.as_deref(), Some("web:42"));
    /// assert_eq!(ctx.call_id.as_deref(), Some("call_1"));
    /// ```
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Set the tool call identifier.
    pub fn with_call(mut self, call_id: &str) -> Self {
        self.call_id = Some(call_id.to_string());
        self
    }
}
