//! Tool execution step.
//!
//! Runs the tool calls of one assistant message against the registry,
//! sequentially and in request order, producing exactly one tool-result
//! message per call.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, info, warn};

use crate::session::{Message, ToolCall};
use crate::tools::{ToolContext, ToolOutput, ToolRegistry};
use crate::utils::metrics::UsageMetrics;

pub struct ToolExecutor {
    registry: Arc<ToolRegistry>,
    metrics: Option<Arc<UsageMetrics>>,
}

impl ToolExecutor {
    pub fn new(registry: Arc<ToolRegistry>) -> Self {
        Self {
            registry,
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<UsageMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Execute `calls` in order and return their results in the same order.
    ///
    /// `executed` holds the call ids already run in this turn; a call whose
    /// id is in it is not run again and gets an error result instead.
    /// Malformed JSON arguments also yield an error result without touching
    /// the registry. Nothing here fails the turn.
    pub async fn execute_pending(
        &self,
        calls: &[ToolCall],
        ctx: &ToolContext,
        executed: &mut HashSet<String>,
    ) -> Vec<Message> {
        let mut results = Vec::with_capacity(calls.len());

        for call in calls {
            let output = if !executed.insert(call.id.clone()) {
                warn!(tool = %call.name, id = %call.id, "Skipping already executed tool call");
                ToolOutput::error(format!(
                    "Error: duplicate call id '{}' was not executed again",
                    call.id
                ))
            } else {
                self.execute_one(call, ctx).await
            };
            results.push(Message::tool_result(&call.id, &output.for_llm));
        }

        results
    }

    async fn execute_one(&self, call: &ToolCall, ctx: &ToolContext) -> ToolOutput {
        let args = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Invalid JSON in tool arguments");
                return ToolOutput::error(format!(
                    "Error: invalid arguments JSON for '{}': {}",
                    call.name, e
                ));
            }
        };

        info!(tool = %call.name, id = %call.id, "Executing tool");
        let start = Instant::now();
        let output = self
            .registry
            .invoke(&call.name, args, &ctx.clone().with_call(&call.id))
            .await;
        let elapsed = start.elapsed();
        debug!(tool = %call.name, latency_ms = elapsed.as_millis() as u64, is_error = output.is_error, "Tool finished");

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.record_tool_call(&call.name, elapsed, output.is_error);
        }
        output
    }
}

fn parse_arguments(raw: &str) -> serde_json::Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}
