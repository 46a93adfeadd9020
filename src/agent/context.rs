//! Context builder for reasoning calls
//!
//! `ContextBuilder` owns the canonical system instruction and assembles the
//! message list sent to the reasoning engine: exactly one system message
//! followed by the (already truncated) history.

use crate::config::AgentDefaults;
use crate::session::{Message, Role};

/// Default system instruction for the agent.
const DEFAULT_SYSTEM_PROMPT: &str = r#"You are a helpful assistant with access to tools.

Use a tool whenever it gives a more reliable answer than reasoning alone, for example for arithmetic. You may call several tools in one step; each result comes back to you before you answer.

If a tool reports an error, read it and either retry with corrected arguments or explain the problem. Always finish with a short, direct answer to the user's question."#;

/// Builds the message list for one reasoning call.
///
/// # Example
///
/// ```rust
/// use toolweave::agent::ContextBuilder;
/// use toolweave::session::{Message, Role};
///
/// let builder = ContextBuilder::new().with_system_prompt("Only answer math questions.");
/// let messages = builder.build_messages(&[Message::user("Add 3 and 4")]);
/// assert_eq!(messages.len(), 2);
/// assert_eq!(messages[0].role, Role::System);
/// ```
#[derive(Debug, Clone)]
pub struct ContextBuilder {
    system_prompt: String,
}

impl ContextBuilder {
    /// Create a builder with the default system instruction.
    pub fn new() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
        }
    }

    /// Builder honoring the `agent.system_prompt` override.
    pub fn from_config(agent: &AgentDefaults) -> Self {
        match agent.system_prompt.as_deref() {
            Some(prompt) if !prompt.trim().is_empty() => Self::new().with_system_prompt(prompt),
            _ => Self::new(),
        }
    }

    /// Replace the system instruction.
    pub fn with_system_prompt(mut self, prompt: &str) -> Self {
        self.system_prompt = prompt.to_string();
        self
    }

    pub fn build_system_message(&self) -> Message {
        Message::system(&self.system_prompt)
    }

    /// System instruction followed by `history`.
    ///
    /// System messages inside `history` are skipped so the canonical one is
    /// always the only one.
    pub fn build_messages(&self, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(self.build_system_message());
        messages.extend(history.iter().filter(|m| m.role != Role::System).cloned());
        messages
    }

    /// Get the current system prompt.
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_prompt() {
        let builder = ContextBuilder::new();
        assert!(builder.system_prompt().contains("tools"));
        assert_eq!(builder.build_system_message().role, Role::System);
    }

    #[test]
    fn test_from_config_override() {
        let mut agent = AgentDefaults::default();
        assert_eq!(
            ContextBuilder::from_config(&agent).system_prompt(),
            DEFAULT_SYSTEM_PROMPT
        );

        agent.system_prompt = Some("Use word tools first.".into());
        assert_eq!(
            ContextBuilder::from_config(&agent).system_prompt(),
            "Use word tools first."
        );

        agent.system_prompt = Some("   ".into());
        assert_eq!(
            ContextBuilder::from_config(&agent).system_prompt(),
            DEFAULT_SYSTEM_PROMPT
        );
    }

    #[test]
    fn test_build_messages_single_system() {
        let builder = ContextBuilder::new();
        let history = vec![
            Message::system("stale"),
            Message::user("Hello"),
            Message::assistant("Hi there!"),
        ];
        let messages = builder.build_messages(&history);
        assert_eq!(messages.len(), 3);
        assert_eq!(
            messages.iter().filter(|m| m.role == Role::System).count(),
            1
        );
        assert_eq!(messages[0].content, DEFAULT_SYSTEM_PROMPT);
        assert_eq!(messages[1].content, "Hello");
    }

    #[test]
    fn test_build_messages_does_not_mutate_input() {
        let history = vec![Message::user("Hello")];
        let before = history.clone();
        let _ = ContextBuilder::new().build_messages(&history);
        assert_eq!(history, before);
    }
}
