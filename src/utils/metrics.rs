//! Engine usage counters.
//!
//! Lock-free totals for turns, tool calls and tokens, plus per-tool call
//! statistics behind a `Mutex`. All recording methods take `&self` so the
//! collector can be shared across sessions via `Arc<UsageMetrics>`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use tracing::info;

/// Per-tool execution statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolStats {
    /// Total number of invocations.
    pub calls: u64,
    /// Invocations whose result was an error.
    pub errors: u64,
    /// Cumulative invocation time.
    pub total_duration: Duration,
}

impl ToolStats {
    /// Average call duration, or `None` before the first call.
    pub fn average_duration(&self) -> Option<Duration> {
        if self.calls == 0 {
            return None;
        }
        Some(self.total_duration / self.calls as u32)
    }
}

/// Counters shared by every session served by one engine.
#[derive(Debug, Default)]
pub struct UsageMetrics {
    turns: AtomicU64,
    refused_turns: AtomicU64,
    failed_turns: AtomicU64,
    reasoning_calls: AtomicU64,
    input_tokens: AtomicU64,
    output_tokens: AtomicU64,
    tools: Mutex<HashMap<String, ToolStats>>,
}

impl UsageMetrics {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_turn(&self) {
        self.turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_refusal(&self) {
        self.refused_turns.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.failed_turns.fetch_add(1, Ordering::Relaxed);
    }

    /// Record one reasoning call and the tokens it reported.
    pub fn record_reasoning(&self, input: u64, output: u64) {
        self.reasoning_calls.fetch_add(1, Ordering::Relaxed);
        self.input_tokens.fetch_add(input, Ordering::Relaxed);
        self.output_tokens.fetch_add(output, Ordering::Relaxed);
    }

    /// Record one tool invocation.
    pub fn record_tool_call(&self, tool: &str, duration: Duration, is_error: bool) {
        let mut tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        let stats = tools.entry(tool.to_string()).or_default();
        stats.calls += 1;
        if is_error {
            stats.errors += 1;
        }
        stats.total_duration += duration;
    }

    pub fn turns(&self) -> u64 {
        self.turns.load(Ordering::Relaxed)
    }

    pub fn refused_turns(&self) -> u64 {
        self.refused_turns.load(Ordering::Relaxed)
    }

    pub fn failed_turns(&self) -> u64 {
        self.failed_turns.load(Ordering::Relaxed)
    }

    pub fn reasoning_calls(&self) -> u64 {
        self.reasoning_calls.load(Ordering::Relaxed)
    }

    /// Token totals as `(input, output)`.
    pub fn tokens(&self) -> (u64, u64) {
        (
            self.input_tokens.load(Ordering::Relaxed),
            self.output_tokens.load(Ordering::Relaxed),
        )
    }

    /// Snapshot of the statistics for one tool.
    pub fn tool_stats(&self, tool: &str) -> Option<ToolStats> {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.get(tool).cloned()
    }

    /// Sum of calls across all tools.
    pub fn total_tool_calls(&self) -> u64 {
        let tools = self.tools.lock().unwrap_or_else(|e| e.into_inner());
        tools.values().map(|s| s.calls).sum()
    }

    /// Emit current counters as a structured log line.
    pub fn emit_usage(&self, reason: &str) {
        let (input_tokens, output_tokens) = self.tokens();
        info!(
            event = "usage_summary",
            reason = reason,
            turns = self.turns(),
            refused = self.refused_turns(),
            failed = self.failed_turns(),
            reasoning_calls = self.reasoning_calls(),
            tool_calls = self.total_tool_calls(),
            input_tokens,
            output_tokens,
            "Usage metrics"
        );
    }
}
