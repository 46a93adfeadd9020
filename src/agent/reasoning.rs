//! Reasoning step: one call to the reasoning engine.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::Result;
use crate::providers::{ChatOptions, LLMProvider, ToolDefinition};
use crate::session::Message;
use crate::utils::metrics::UsageMetrics;

use super::compaction::{truncate, ContextBudget};
use super::context::ContextBuilder;

/// Wraps the reasoning engine with the canonical system instruction, the
/// context budget and the sampling options of the agent.
pub struct ReasoningStep {
    provider: Arc<dyn LLMProvider>,
    context: ContextBuilder,
    budget: ContextBudget,
    model: String,
    options: ChatOptions,
    metrics: Option<Arc<UsageMetrics>>,
}

impl ReasoningStep {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        let model = provider.default_model().to_string();
        Self {
            provider,
            context: ContextBuilder::new(),
            budget: ContextBudget::default(),
            model,
            options: ChatOptions::new(),
            metrics: None,
        }
    }

    pub fn from_config(provider: Arc<dyn LLMProvider>, config: &Config) -> Self {
        Self {
            provider,
            context: ContextBuilder::from_config(&config.agent),
            budget: ContextBudget::from_config(&config.context),
            model: config.agent.model.clone(),
            options: ChatOptions::new()
                .with_max_tokens(config.agent.max_tokens)
                .with_temperature(config.agent.temperature),
            metrics: None,
        }
    }

    pub fn with_budget(mut self, budget: ContextBudget) -> Self {
        self.budget = budget;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Produce the next assistant message for `history`.
    ///
    /// The history is truncated to the budget and prefixed with the system
    /// instruction before the call; neither input is modified. Call ids that
    /// are empty or already used in the conversation are replaced with fresh
    /// ones, so every id in the returned message is unique.
    ///
    /// # Errors
    /// Transport and API errors of the reasoning engine are returned as-is.
    pub async fn reason(&self, history: &[Message], tools: &[ToolDefinition]) -> Result<Message> {
        let trimmed = truncate(history, &self.budget);
        if trimmed.len() < history.len() {
            crate::log_component!(
                debug,
                "context",
                "history truncated",
                dropped = history.len() - trimmed.len(),
                kept = trimmed.len()
            );
        }
        let messages = self.context.build_messages(&trimmed);
        debug!(
            history = history.len(),
            sent = messages.len(),
            tools = tools.len(),
            "Calling reasoning engine"
        );

        let response = self
            .provider
            .chat(
                messages,
                tools.to_vec(),
                Some(self.model.as_str()),
                self.options.clone(),
            )
            .await?;

        if let Some(metrics) = self.metrics.as_ref() {
            let (input, output) = response
                .usage
                .as_ref()
                .map(|u| (u.prompt_tokens as u64, u.completion_tokens as u64))
                .unwrap_or((0, 0));
            metrics.record_reasoning(input, output);
        }

        let mut message = response.into_message();
        assign_fresh_call_ids(history, &mut message);
        Ok(message)
    }
}

fn assign_fresh_call_ids(history: &[Message], message: &mut Message) {
    let mut used: HashSet<String> = history
        .iter()
        .flat_map(|m| m.calls().iter().map(|c| c.id.clone()))
        .collect();

    for call in message.tool_calls.iter_mut().flatten() {
        if call.id.is_empty() || used.contains(&call.id) {
            let fresh = format!("call_{}", Uuid::new_v4().simple());
            warn!(tool = %call.name, old_id = %call.id, new_id = %fresh, "Replacing reused tool call id");
            call.id = fresh;
        }
        used.insert(call.id.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{LLMResponse, LLMToolCall, Usage};
    use crate::session::{Role, ToolCall};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays one canned response and records what it was sent.
    struct Canned {
        response: LLMResponse,
        seen: Mutex<Vec<Vec<Message>>>,
    }

    #[async_trait]
    impl LLMProvider for Canned {
        async fn chat(
            &self,
            messages: Vec<Message>,
            _tools: Vec<ToolDefinition>,
            _model: Option<&str>,
            _options: ChatOptions,
        ) -> Result<LLMResponse> {
            self.seen.lock().unwrap().push(messages);
            Ok(self.response.clone())
        }
        fn default_model(&self) -> &str {
            "canned"
        }
        fn name(&self) -> &str {
            "canned"
        }
    }

    fn canned(response: LLMResponse) -> Arc<Canned> {
        Arc::new(Canned {
            response,
            seen: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn test_reason_prepends_single_system_message() {
        let provider = canned(LLMResponse::text("hello"));
        let step = ReasoningStep::new(provider.clone());
        let history = vec![Message::system("stale"), Message::user("hi")];

        let msg = step.reason(&history, &[]).await.unwrap();
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.content, "hello");
        assert!(!msg.has_tool_calls());

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][0].role, Role::System);
        assert_ne!(seen[0][0].content, "stale");
        // Input untouched.
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_reason_returns_tool_calls() {
        let provider = canned(LLMResponse::with_tools(
            "",
            vec![
                LLMToolCall::new("c1", "add", r#"{"a":3,"b":4}"#),
                LLMToolCall::new("c2", "multiply", r#"{"a":2,"b":5}"#),
            ],
        ));
        let step = ReasoningStep::new(provider);
        let msg = step.reason(&[Message::user("go")], &[]).await.unwrap();
        let names: Vec<_> = msg.calls().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["add", "multiply"]);
        assert_eq!(msg.calls()[0].id, "c1");
    }

    #[tokio::test]
    async fn test_reused_call_ids_are_replaced() {
        let provider = canned(LLMResponse::with_tools(
            "",
            vec![
                LLMToolCall::new("call_0", "add", "{}"),
                LLMToolCall::new("call_0", "add", "{}"),
                LLMToolCall::new("", "add", "{}"),
            ],
        ));
        let step = ReasoningStep::new(provider);
        let history = vec![
            Message::user("earlier"),
            Message::assistant_with_tools("", vec![ToolCall::new("call_0", "add", "{}")]),
            Message::tool_result("call_0", "7"),
        ];
        let msg = step.reason(&history, &[]).await.unwrap();
        let ids: HashSet<_> = msg.calls().iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), 3);
        assert!(!ids.contains("call_0"));
        assert!(!ids.contains(""));
    }

    #[tokio::test]
    async fn test_reason_records_usage() {
        let provider = canned(LLMResponse::text("ok").with_usage(Usage::new(12, 3)));
        let metrics = Arc::new(UsageMetrics::new());
        let step = ReasoningStep::new(provider).with_metrics(metrics.clone());
        step.reason(&[Message::user("hi")], &[]).await.unwrap();
        assert_eq!(metrics.reasoning_calls(), 1);
        assert_eq!(metrics.tokens(), (12, 3));
    }

    #[tokio::test]
    async fn test_reason_truncates_to_budget() {
        let provider = canned(LLMResponse::text("ok"));
        let step = ReasoningStep::new(provider.clone()).with_budget(ContextBudget::new(1, 10_000));
        let history = vec![Message::user("one"), Message::assistant("two"), Message::user("three")];
        step.reason(&history, &[]).await.unwrap();
        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen[0].len(), 2);
        assert_eq!(seen[0][1].content, "three");
    }
}
