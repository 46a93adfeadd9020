//! Agent module - the turn engine and its steps
//!
//! - [`compaction`]: keeps history within the context budget
//! - [`ContextBuilder`]: canonical system instruction
//! - [`ReasoningStep`]: one call to the reasoning engine
//! - [`ToolExecutor`]: runs requested tool calls through the registry
//! - [`QuestionGate`]: optional pre-reasoning classification
//! - [`AgentLoop`]: the state machine tying them together
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ submit_turn │────>│  AgentLoop  │────>│ LLMProvider │
//! │             │     │             │     │ (reasoning) │
//! └─────────────┘     └─────────────┘     └─────────────┘
//!                            │                   │
//!                            ▼                   ▼
//!                     ┌─────────────┐     ┌─────────────┐
//!                     │   Session   │     │    Tool     │
//!                     │   Manager   │     │  Registry   │
//!                     └─────────────┘     └─────────────┘
//! ```

pub mod compaction;
mod context;
mod executor;
mod gate;
mod r#loop;
mod reasoning;

pub use compaction::{truncate, ContextBudget};
pub use context::ContextBuilder;
pub use executor::ToolExecutor;
pub use gate::{gate_from_config, GateDecision, KeywordGate, ModelGate, QuestionGate};
pub use r#loop::{AgentLoop, TurnOutcome, TurnState};
pub use reasoning::ReasoningStep;
