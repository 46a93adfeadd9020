//! Session types for Toolweave
//!
//! This module defines the conversation model: sessions, messages, roles and
//! the tool-call requests an assistant message may carry.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, WeaveError};

/// A conversation keyed by a session identifier.
///
/// Insertion order of `messages` is the only meaningful order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier supplied by the caller (e.g. "web:42")
    pub key: String,
    /// Ordered conversation history
    pub messages: Vec<Message>,
    /// When this session was created
    pub created_at: DateTime<Utc>,
    /// When this session was last committed
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new empty session with the given key.
    ///
    /// # Example
    /// ```
    /// use toolweave::session::Session;
    ///
    /// let session = Session::new("web:42");
    /// assert!(session.messages.is_empty());
    /// ```
    pub fn new(key: &str) -> Self {
        let now = Utc::now();
        Self {
            key: key.to_string(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Append a message after checking it against the existing history.
    ///
    /// A tool-result is rejected unless it answers a call id emitted by an
    /// earlier assistant message that has not been answered yet.
    ///
    /// # Example
    /// ```
    /// use toolweave::session::{Message, Session, ToolCall};
    ///
    /// let mut session = Session::new("test");
    /// session.append(Message::user("Add 3 and 4")).unwrap();
    /// session
    ///     .append(Message::assistant_with_tools("", vec![ToolCall::new("c1", "add", "{}")]))
    ///     .unwrap();
    /// assert!(session.append(Message::tool_result("c1", "7")).is_ok());
    /// assert!(session.append(Message::tool_result("c9", "?")).is_err());
    /// ```
    pub fn append(&mut self, message: Message) -> Result<()> {
        if let Some(call_id) = message.result_call_id() {
            let issued = self
                .messages
                .iter()
                .flat_map(|m| m.tool_calls.iter().flatten())
                .any(|c| c.id == call_id);
            if !issued {
                return Err(WeaveError::InvalidMessage(format!(
                    "tool result references unknown call id '{}'",
                    call_id
                )));
            }
            let answered = self
                .messages
                .iter()
                .any(|m| m.result_call_id() == Some(call_id));
            if answered {
                return Err(WeaveError::InvalidMessage(format!(
                    "call id '{}' already has a result",
                    call_id
                )));
            }
        } else if message.role == Role::Tool {
            return Err(WeaveError::InvalidMessage(
                "tool result without a call id".into(),
            ));
        }
        self.messages.push(message);
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Get the number of messages in this session.
    pub fn message_count(&self) -> usize {
        self.messages.len()
    }

    /// Check if this session is empty (no messages).
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Get the last message in this session, if any.
    pub fn last_message(&self) -> Option<&Message> {
        self.messages.last()
    }
}

/// Check a whole conversation against the tool-result invariant.
///
/// Every tool-result must reference exactly one call id previously emitted
/// by an assistant message, and no call id may be answered twice.
pub fn validate_history(messages: &[Message]) -> Result<()> {
    let mut issued: HashSet<&str> = HashSet::new();
    let mut answered: HashSet<&str> = HashSet::new();

    for (idx, msg) in messages.iter().enumerate() {
        for call in msg.tool_calls.iter().flatten() {
            issued.insert(call.id.as_str());
        }
        if msg.role != Role::Tool {
            continue;
        }
        let call_id = msg.tool_call_id.as_deref().ok_or_else(|| {
            WeaveError::InvalidMessage(format!("message {} is a tool result without a call id", idx))
        })?;
        if !issued.contains(call_id) {
            return Err(WeaveError::InvalidMessage(format!(
                "message {} references unknown call id '{}'",
                idx, call_id
            )));
        }
        if !answered.insert(call_id) {
            return Err(WeaveError::InvalidMessage(format!(
                "message {} answers call id '{}' a second time",
                idx, call_id
            )));
        }
    }

    Ok(())
}

/// A single message in a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
    /// Tool calls requested by the assistant (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message answers (tool results only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use toolweave::session::{Message, Role};
    ///
    /// let msg = Message::user("Add 3 and 4");
    /// assert_eq!(msg.role, Role::User);
    /// ```
    pub fn user(content: &str) -> Self {
        Self {
            role: Role::User,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new assistant message with no tool calls.
    pub fn assistant(content: &str) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a new system message.
    pub fn system(content: &str) -> Self {
        Self {
            role: Role::System,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    /// Create a tool-result message answering `tool_call_id`.
    ///
    /// # Example
    /// ```
    /// use toolweave::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "7");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id.as_deref(), Some("call_123"));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        Self {
            role: Role::Tool,
            content: content.to_string(),
            tool_calls: None,
            tool_call_id: Some(tool_call_id.to_string()),
        }
    }

    /// Create an assistant message carrying tool-call requests.
    ///
    /// An empty `tool_calls` vector produces a plain assistant message.
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.to_string(),
            tool_calls: if tool_calls.is_empty() {
                None
            } else {
                Some(tool_calls)
            },
            tool_call_id: None,
        }
    }

    /// Check if this message has pending tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }

    /// The call id this message answers, for tool results.
    pub fn result_call_id(&self) -> Option<&str> {
        if self.role == Role::Tool {
            self.tool_call_id.as_deref()
        } else {
            None
        }
    }

    /// Tool calls carried by this message (empty for non-assistant messages).
    pub fn calls(&self) -> &[ToolCall] {
        self.tool_calls.as_deref().unwrap_or(&[])
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System instruction
    System,
    /// Messages from the user
    User,
    /// Messages from the reasoning engine
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool-call request emitted by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Call identifier, unique within the conversation
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use toolweave::session::ToolCall;
    ///
    /// let call = ToolCall::new("call_1", "add", r#"{"a": 3, "b": 4}"#);
    /// assert_eq!(call.name, "add");
    /// ```
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as a specific type.
    pub fn parse_arguments<T: serde::de::DeserializeOwned>(&self) -> serde_json::Result<T> {
        serde_json::from_str(&self.arguments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(id: &str) -> ToolCall {
        ToolCall::new(id, "add", r#"{"a":1,"b":2}"#)
    }

    #[test]
    fn test_session_new() {
        let session = Session::new("test-session");
        assert_eq!(session.key, "test-session");
        assert!(session.is_empty());
        assert!(session.created_at <= session.updated_at);
    }

    #[test]
    fn test_append_plain_messages() {
        let mut session = Session::new("s");
        session.append(Message::user("hi")).unwrap();
        session.append(Message::assistant("hello")).unwrap();
        assert_eq!(session.message_count(), 2);
        assert_eq!(session.last_message().unwrap().role, Role::Assistant);
    }

    #[test]
    fn test_append_rejects_unknown_call_id() {
        let mut session = Session::new("s");
        session.append(Message::user("hi")).unwrap();
        let err = session.append(Message::tool_result("nope", "x")).unwrap_err();
        assert!(matches!(err, WeaveError::InvalidMessage(_)));
        assert_eq!(session.message_count(), 1);
    }

    #[test]
    fn test_append_rejects_second_result() {
        let mut session = Session::new("s");
        session
            .append(Message::assistant_with_tools("", vec![call("c1")]))
            .unwrap();
        session.append(Message::tool_result("c1", "3")).unwrap();
        assert!(session.append(Message::tool_result("c1", "3")).is_err());
    }

    #[test]
    fn test_append_rejects_tool_role_without_id() {
        let mut session = Session::new("s");
        let mut msg = Message::tool_result("c1", "x");
        msg.tool_call_id = None;
        assert!(session.append(msg).is_err());
    }

    #[test]
    fn test_validate_history_ok() {
        let history = vec![
            Message::user("Add 1 and 2"),
            Message::assistant_with_tools("", vec![call("c1"), call("c2")]),
            Message::tool_result("c1", "3"),
            Message::tool_result("c2", "3"),
            Message::assistant("3"),
        ];
        assert!(validate_history(&history).is_ok());
    }

    #[test]
    fn test_validate_history_result_before_call() {
        let history = vec![
            Message::tool_result("c1", "3"),
            Message::assistant_with_tools("", vec![call("c1")]),
        ];
        assert!(validate_history(&history).is_err());
    }

    #[test]
    fn test_validate_history_duplicate_result() {
        let history = vec![
            Message::assistant_with_tools("", vec![call("c1")]),
            Message::tool_result("c1", "3"),
            Message::tool_result("c1", "3"),
        ];
        let err = validate_history(&history).unwrap_err();
        assert!(err.to_string().contains("second time"));
    }

    #[test]
    fn test_assistant_with_empty_tools_is_plain() {
        let msg = Message::assistant_with_tools("done", vec![]);
        assert!(!msg.has_tool_calls());
        assert!(msg.tool_calls.is_none());
        assert!(msg.calls().is_empty());
    }

    #[test]
    fn test_message_tool_result() {
        let msg = Message::tool_result("call_123", "Success");
        assert_eq!(msg.role, Role::Tool);
        assert!(msg.is_tool_result());
        assert_eq!(msg.result_call_id(), Some("call_123"));
        assert_eq!(Message::user("x").result_call_id(), None);
    }

    #[test]
    fn test_role_serialize() {
        let json = serde_json::to_string(&Role::Tool).unwrap();
        assert_eq!(json, r#""tool""#);
        let parsed: Role = serde_json::from_str(r#""assistant""#).unwrap();
        assert_eq!(parsed, Role::Assistant);
        assert_eq!(Role::System.to_string(), "system");
    }

    #[test]
    fn test_tool_call_parse_arguments() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct AddArgs {
            a: i64,
            b: i64,
        }

        let args: AddArgs = call("c").parse_arguments().unwrap();
        assert_eq!(args, AddArgs { a: 1, b: 2 });
    }

    #[test]
    fn test_message_serialization_skips_none() {
        let json = serde_json::to_string(&Message::user("Hello")).unwrap();
        assert!(!json.contains("tool_calls"));
        assert!(!json.contains("tool_call_id"));
    }
}
