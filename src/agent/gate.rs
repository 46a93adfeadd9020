//! Question-classification gate.
//!
//! A gate runs once per turn, before any reasoning, and decides whether the
//! question is in scope. A refused turn ends immediately with a canned reply.
//!
//! # Example
//!
//! ```
//! use toolweave::agent::{GateDecision, KeywordGate, QuestionGate};
//!
//! # tokio_test::block_on(async {
//! let gate = KeywordGate::math();
//! assert_eq!(gate.classify("Add 3 and 4").await.unwrap(), GateDecision::Allow);
//! assert_eq!(gate.classify("What's the weather today?").await.unwrap(), GateDecision::Refuse);
//! # });
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::config::{GateConfig, GateKind};
use crate::error::{Result, WeaveError};
use crate::providers::{ChatOptions, LLMProvider};
use crate::session::Message;

/// Outcome of classifying one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Refuse,
}

/// Pre-reasoning classifier.
#[async_trait]
pub trait QuestionGate: Send + Sync {
    /// Short label for logs.
    fn name(&self) -> &str;

    /// Classify the user's question.
    async fn classify(&self, question: &str) -> Result<GateDecision>;
}

/// Allows a question when any of its patterns matches.
pub struct KeywordGate {
    patterns: Vec<Regex>,
}

impl KeywordGate {
    /// Build a gate from case-insensitive patterns.
    pub fn new(patterns: &[&str]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", p)).map_err(|e| {
                    WeaveError::Config(format!("invalid gate pattern '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    /// Gate that only lets arithmetic questions through.
    #[must_use]
    pub fn math() -> Self {
        let defs = [
            // 3 + 4, 12*7, 9 / 3, 2^8
            r"\d\s*[+*/×÷^]\s*\d",
            // "10 - 4", "6 x 7"; unspaced forms are ranges and sizes ("2-3 days", "4x4")
            r"\d\s+[-x]\s+\d",
            r"\b(add|adds|added|plus|sum|subtract|minus|difference|multiply|multiplied|times|divide|divided|quotient|remainder|modulo)\b",
            r"\b(calculate|compute|evaluate|solve|math|arithmetic|equation|square root|percent(age)?)\b",
            r"\bhow much is\b.*\d",
        ];
        let patterns = defs
            .iter()
            .map(|p| {
                Regex::new(&format!("(?i){}", p))
                    .unwrap_or_else(|e| panic!("BUG: invalid built-in gate pattern '{p}': {e}"))
            })
            .collect();
        Self { patterns }
    }
}

#[async_trait]
impl QuestionGate for KeywordGate {
    fn name(&self) -> &str {
        "keyword"
    }

    async fn classify(&self, question: &str) -> Result<GateDecision> {
        if self.patterns.iter().any(|re| re.is_match(question)) {
            Ok(GateDecision::Allow)
        } else {
            Ok(GateDecision::Refuse)
        }
    }
}

const CLASSIFIER_PROMPT: &str = "You classify questions. Reply with exactly one word: YES if the user's question is a math or arithmetic question, NO otherwise.";

/// Asks the reasoning engine for a YES/NO classification.
pub struct ModelGate {
    provider: Arc<dyn LLMProvider>,
    model: Option<String>,
    prompt: String,
}

impl ModelGate {
    pub fn new(provider: Arc<dyn LLMProvider>) -> Self {
        Self {
            provider,
            model: None,
            prompt: CLASSIFIER_PROMPT.to_string(),
        }
    }

    pub fn with_model(mut self, model: &str) -> Self {
        self.model = Some(model.to_string());
        self
    }

    /// Replace the classifier instruction. It must ask for a YES/NO answer.
    pub fn with_prompt(mut self, prompt: &str) -> Self {
        self.prompt = prompt.to_string();
        self
    }
}

#[async_trait]
impl QuestionGate for ModelGate {
    fn name(&self) -> &str {
        "model"
    }

    async fn classify(&self, question: &str) -> Result<GateDecision> {
        let messages = vec![Message::system(&self.prompt), Message::user(question)];
        let options = ChatOptions::new().with_max_tokens(3).with_temperature(0.0);
        let response = self
            .provider
            .chat(messages, Vec::new(), self.model.as_deref(), options)
            .await?;

        let verdict = response.content.trim().to_ascii_uppercase();
        debug!(verdict = %verdict, "Model gate verdict");
        if verdict.starts_with("YES") {
            Ok(GateDecision::Allow)
        } else {
            Ok(GateDecision::Refuse)
        }
    }
}

/// Build the configured gate, or `None` when gating is disabled.
pub fn gate_from_config(
    config: &GateConfig,
    provider: Arc<dyn LLMProvider>,
    model: &str,
) -> Option<Arc<dyn QuestionGate>> {
    if !config.enabled {
        return None;
    }
    let gate: Arc<dyn QuestionGate> = match config.kind {
        GateKind::Keyword => Arc::new(KeywordGate::math()),
        GateKind::Model => Arc::new(ModelGate::new(provider).with_model(model)),
    };
    Some(gate)
}
