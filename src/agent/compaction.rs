//! Context window management for conversation history.
//!
//! [`truncate`] is a pure function over `&[Message]`:
//!
//! - System messages are always removed. The reasoning step prepends exactly
//!   one canonical system message per call, so stored ones would pile up.
//! - The rest is split into *units*: an assistant message carrying tool
//!   calls together with every tool result answering one of those calls,
//!   or any other single message. Tool results that answer no retained
//!   call are dropped.
//! - While the history exceeds the [`ContextBudget`], the oldest unit is
//!   dropped. The newest unit always survives, so the current exchange is
//!   never cut in half.
//!
//! Truncating an already-compliant history returns it unchanged.

use std::collections::HashMap;

use crate::config::ContextConfig;
use crate::session::{Message, Role};

/// Fixed per-message overhead (role, separators) in estimated tokens.
const MESSAGE_OVERHEAD_TOKENS: usize = 4;

/// Size limits for the history sent to the reasoning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContextBudget {
    /// Maximum number of messages (system prompt excluded)
    pub max_messages: usize,
    /// Maximum estimated tokens (system prompt excluded)
    pub max_tokens: usize,
}

impl ContextBudget {
    pub fn new(max_messages: usize, max_tokens: usize) -> Self {
        Self {
            max_messages,
            max_tokens,
        }
    }

    pub fn from_config(config: &ContextConfig) -> Self {
        Self::new(config.max_messages, config.max_tokens)
    }

    /// Whether `messages` fits both limits.
    pub fn fits(&self, messages: &[Message]) -> bool {
        messages.len() <= self.max_messages && estimate_history_tokens(messages) <= self.max_tokens
    }
}

impl Default for ContextBudget {
    fn default() -> Self {
        Self::from_config(&ContextConfig::default())
    }
}

/// Rough token estimate for one message (about four bytes per token).
///
/// # Examples
/// ```
/// use toolweave::agent::compaction::estimate_tokens;
/// use toolweave::session::Message;
///
/// assert!(estimate_tokens(&Message::user("Add 3 and 4")) > 0);
/// ```
pub fn estimate_tokens(message: &Message) -> usize {
    let mut bytes = message.content.len();
    for call in message.calls() {
        bytes += call.name.len() + call.arguments.len() + call.id.len();
    }
    if let Some(ref id) = message.tool_call_id {
        bytes += id.len();
    }
    bytes.div_ceil(4) + MESSAGE_OVERHEAD_TOKENS
}

pub fn estimate_history_tokens(messages: &[Message]) -> usize {
    messages.iter().map(estimate_tokens).sum()
}

/// Assign every non-system message to a unit; orphaned tool results get
/// `None`. Unit numbers increase with the position of the unit's first
/// message.
fn assign_units(messages: &[Message]) -> Vec<Option<usize>> {
    let mut owner: HashMap<&str, usize> = HashMap::new();
    let mut next_unit = 0;

    messages
        .iter()
        .map(|msg| {
            if msg.role == Role::System {
                return None;
            }
            if msg.role == Role::Tool {
                // Each call id is answered at most once.
                return msg.result_call_id().and_then(|id| owner.remove(id));
            }
            let unit = next_unit;
            next_unit += 1;
            for call in msg.calls() {
                owner.insert(call.id.as_str(), unit);
            }
            Some(unit)
        })
        .collect()
}

/// Trim `history` to `budget`, dropping whole units oldest first.
///
/// # Arguments
/// * `history` - The stored conversation
/// * `budget` - Message and token limits
///
/// # Examples
/// ```
/// use toolweave::agent::compaction::{truncate, ContextBudget};
/// use toolweave::session::Message;
///
/// let history = vec![
///     Message::system("stale prompt"),
///     Message::user("first"),
///     Message::assistant("one"),
///     Message::user("second"),
///     Message::assistant("two"),
/// ];
/// let kept = truncate(&history, &ContextBudget::new(2, 10_000));
/// assert_eq!(kept.len(), 2);
/// assert_eq!(kept[0].content, "second");
///
/// // Already within budget: unchanged.
/// assert_eq!(truncate(&kept, &ContextBudget::new(2, 10_000)), kept);
/// ```
pub fn truncate(history: &[Message], budget: &ContextBudget) -> Vec<Message> {
    let units = assign_units(history);
    let Some(newest) = units.iter().flatten().copied().max() else {
        return Vec::new();
    };

    let mut unit_messages = vec![0usize; newest + 1];
    let mut unit_tokens = vec![0usize; newest + 1];
    for (msg, unit) in history.iter().zip(&units) {
        if let Some(u) = *unit {
            unit_messages[u] += 1;
            unit_tokens[u] += estimate_tokens(msg);
        }
    }

    let mut total_messages: usize = unit_messages.iter().sum();
    let mut total_tokens: usize = unit_tokens.iter().sum();
    let mut first_kept = 0;
    while first_kept < newest
        && (total_messages > budget.max_messages || total_tokens > budget.max_tokens)
    {
        total_messages -= unit_messages[first_kept];
        total_tokens -= unit_tokens[first_kept];
        first_kept += 1;
    }

    history
        .iter()
        .zip(units)
        .filter(|(_, unit)| matches!(unit, Some(u) if *u >= first_kept))
        .map(|(msg, _)| msg.clone())
        .collect()
}
