//! Toolweave - a tool-using conversational agent engine
//!
//! A turn goes user message → reasoning → (tool execution → reasoning)* →
//! final answer, over per-session history, with tools aggregated from local
//! and MCP backends.

pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod session;
pub mod tools;
pub mod utils;

pub use agent::{AgentLoop, TurnOutcome, TurnState};
pub use config::Config;
pub use error::{ProviderError, Result, WeaveError};
pub use providers::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, OpenAIProvider, ToolDefinition, Usage,
};
pub use session::{Message, Role, Session, SessionManager, ToolCall};
pub use tools::{ToolBackend, ToolOutput, ToolRegistry};
