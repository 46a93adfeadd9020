//! MCP wire types (JSON-RPC 2.0 envelopes and the tool-related payloads).

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, WeaveError};
use crate::tools::{ToolOutput, ToolSpec};

/// Protocol revision announced in `initialize`.
pub const PROTOCOL_VERSION: &str = "2025-03-26";

// ---- JSON-RPC 2.0 envelopes ----

#[derive(Debug, Serialize)]
pub struct JsonRpcRequest<'a> {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl<'a> JsonRpcRequest<'a> {
    pub fn new(id: u64, method: &'a str, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method,
            params,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct JsonRpcNotification<'a> {
    pub jsonrpc: &'static str,
    pub method: &'a str,
}

impl<'a> JsonRpcNotification<'a> {
    pub fn new(method: &'a str) -> Self {
        Self {
            jsonrpc: "2.0",
            method,
        }
    }
}

/// Any message a server may send. Requests and notifications from the
/// server carry a `method`; responses carry `result` or `error`.
#[derive(Debug, Deserialize)]
pub struct JsonRpcMessage {
    #[serde(default)]
    pub id: Option<Value>,
    #[serde(default)]
    pub method: Option<String>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

#[derive(Debug, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

impl JsonRpcMessage {
    /// Whether this is the response to request `id`.
    pub fn answers(&self, id: u64) -> bool {
        self.method.is_none() && self.id.as_ref().and_then(Value::as_u64) == Some(id)
    }

    /// Unwrap the result, mapping a JSON-RPC error to `WeaveError::Mcp`.
    pub fn into_result(self) -> Result<Value> {
        if let Some(err) = self.error {
            return Err(WeaveError::Mcp(format!(
                "server error {}: {}",
                err.code, err.message
            )));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

// ---- MCP payloads ----

pub fn initialize_params() -> Value {
    serde_json::json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": {},
        "clientInfo": {
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
        }
    })
}

#[derive(Debug, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<ToolSpec>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<ContentBlock>,
    #[serde(rename = "isError", default)]
    pub is_error: bool,
}

impl CallToolResult {
    /// Text blocks joined by newlines; non-text blocks are skipped.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text.as_str()),
                ContentBlock::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn into_output(self) -> ToolOutput {
        let text = self.text();
        if self.is_error {
            ToolOutput::error(if text.is_empty() {
                "MCP tool returned error".to_string()
            } else {
                text
            })
        } else {
            ToolOutput::llm_only(if text.is_empty() {
                "(no output)".to_string()
            } else {
                text
            })
        }
    }
}

/// Find the response to `id` in a `text/event-stream` body.
pub fn find_sse_response(body: &str, id: u64) -> Option<JsonRpcMessage> {
    let mut data = String::new();
    // A blank line terminates an event; make sure the last one is flushed.
    for line in body.lines().chain(std::iter::once("")) {
        let line = line.trim_end_matches('\r');
        if let Some(rest) = line.strip_prefix("data:") {
            if !data.is_empty() {
                data.push('\n');
            }
            data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
        } else if line.is_empty() && !data.is_empty() {
            if let Ok(msg) = serde_json::from_str::<JsonRpcMessage>(&data) {
                if msg.answers(id) {
                    return Some(msg);
                }
            }
            data.clear();
        }
    }
    None
}
