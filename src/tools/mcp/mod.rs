//! Remote tool backends speaking the Model Context Protocol.
//!
//! An [`McpBackend`] wraps one configured server, reached either by spawning
//! a local process ([`stdio`]) or over HTTP ([`http`]). Nothing is contacted
//! at construction time; the first `list_tools` (the startup liveness probe)
//! connects and runs the `initialize` handshake.

pub mod http;
pub mod protocol;
pub mod stdio;

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::config::{BackendServerConfig, BackendTransport};
use crate::error::{Result, WeaveError};
use crate::tools::{ToolBackend, ToolContext, ToolOutput, ToolSpec};

use self::http::HttpTransport;
use self::protocol::{CallToolResult, ToolsListResult};
use self::stdio::StdioTransport;

/// Upper bound on `tools/list` pages, against servers that loop cursors.
const MAX_LIST_PAGES: usize = 32;

enum Transport {
    Stdio(StdioTransport),
    Http(HttpTransport),
}

impl Transport {
    async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        match self {
            Transport::Stdio(t) => t.request(method, params, timeout).await,
            Transport::Http(t) => t.request(method, params, timeout).await,
        }
    }
}

/// One MCP server as a [`ToolBackend`].
pub struct McpBackend {
    name: String,
    timeout: Duration,
    transport: Transport,
}

impl McpBackend {
    /// Build a backend from its configuration entry.
    ///
    /// Fails only on an incomplete entry (stdio without `command`, http
    /// without `url`); the server itself is not contacted.
    pub fn from_config(server: &BackendServerConfig) -> Result<Self> {
        let transport = match server.transport {
            BackendTransport::Stdio => {
                let command = server.command.as_deref().ok_or_else(|| {
                    WeaveError::Config(format!("backend '{}' has no command", server.name))
                })?;
                Transport::Stdio(StdioTransport::new(
                    command,
                    server.args.clone(),
                    server.env.clone(),
                ))
            }
            BackendTransport::Http => {
                let url = server.url.as_deref().ok_or_else(|| {
                    WeaveError::Config(format!("backend '{}' has no url", server.name))
                })?;
                Transport::Http(HttpTransport::new(url, server.headers.clone()))
            }
        };
        Ok(Self {
            name: server.name.clone(),
            timeout: Duration::from_secs(server.timeout_secs),
            transport,
        })
    }
}

#[async_trait]
impl ToolBackend for McpBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn transport(&self) -> &str {
        match self.transport {
            Transport::Stdio(_) => "stdio",
            Transport::Http(_) => "http",
        }
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_LIST_PAGES {
            let params = cursor.as_ref().map(|c| json!({ "cursor": c }));
            let raw = self
                .transport
                .request("tools/list", params, self.timeout)
                .await?;
            let page: ToolsListResult = serde_json::from_value(raw)?;
            tools.extend(page.tools);

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!(backend = %self.name, tools = tools.len(), "Listed MCP tools");
        Ok(tools)
    }

    async fn call_tool(&self, name: &str, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let raw = self
            .transport
            .request(
                "tools/call",
                Some(json!({ "name": name, "arguments": args })),
                self.timeout,
            )
            .await?;
        let result: CallToolResult = serde_json::from_value(raw)?;
        Ok(result.into_output())
    }
}
