//! MCP over a child process's stdin/stdout.
//!
//! Messages are newline-delimited JSON. The child is spawned on first use
//! and kept for the lifetime of the backend; requests are serialized through
//! a mutex since the pipe carries one conversation at a time.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WeaveError};

use super::protocol::{initialize_params, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest};

struct Connection {
    // Held so the process is killed when the connection is dropped.
    _child: Child,
    stdin: ChildStdin,
    stdout: BufReader<ChildStdout>,
}

impl Connection {
    async fn send_line(&mut self, line: String) -> Result<()> {
        self.stdin.write_all(line.as_bytes()).await?;
        self.stdin.write_all(b"\n").await?;
        self.stdin.flush().await?;
        Ok(())
    }

    /// Transport-level exchange; a JSON-RPC error is still an `Ok` message.
    async fn request(&mut self, id: u64, method: &str, params: Option<Value>) -> Result<JsonRpcMessage> {
        let line = serde_json::to_string(&JsonRpcRequest::new(id, method, params))?;
        self.send_line(line).await?;

        let mut buf = String::new();
        loop {
            buf.clear();
            if self.stdout.read_line(&mut buf).await? == 0 {
                return Err(WeaveError::Mcp("server closed its stdout".into()));
            }
            let trimmed = buf.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<JsonRpcMessage>(trimmed) {
                Ok(msg) if msg.answers(id) => return Ok(msg),
                Ok(msg) => debug!(method = ?msg.method, "Skipping unrelated MCP message"),
                Err(_) => debug!(line = %trimmed, "Skipping non-JSON line on MCP stdout"),
            }
        }
    }

    async fn notify(&mut self, method: &str) -> Result<()> {
        let line = serde_json::to_string(&JsonRpcNotification::new(method))?;
        self.send_line(line).await
    }
}

/// Stdio transport for one MCP server process.
pub struct StdioTransport {
    command: String,
    args: Vec<String>,
    env: HashMap<String, String>,
    next_id: AtomicU64,
    conn: Mutex<Option<Connection>>,
}

impl StdioTransport {
    pub fn new(command: &str, args: Vec<String>, env: HashMap<String, String>) -> Self {
        Self {
            command: command.to_string(),
            args,
            env,
            next_id: AtomicU64::new(1),
            conn: Mutex::new(None),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    async fn connect(&self) -> Result<Connection> {
        let mut cmd = Command::new(&self.command);
        cmd.args(&self.args)
            .envs(&self.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            WeaveError::Mcp(format!("failed to spawn '{}': {}", self.command, e))
        })?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| WeaveError::Mcp("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| WeaveError::Mcp("child stdout unavailable".into()))?;

        let mut conn = Connection {
            _child: child,
            stdin,
            stdout: BufReader::new(stdout),
        };
        conn.request(self.next_id(), "initialize", Some(initialize_params()))
            .await?
            .into_result()?;
        conn.notify("notifications/initialized").await?;
        info!(command = %self.command, "MCP stdio server initialized");
        Ok(conn)
    }

    /// Send one request and wait for its response.
    ///
    /// The timeout covers spawning and the handshake when the process is
    /// not running yet. A timed-out or failed exchange drops the process so
    /// the next request starts from a clean pipe.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let mut guard = self.conn.lock().await;

        let exchange = async {
            if guard.is_none() {
                *guard = Some(self.connect().await?);
            }
            let conn = guard
                .as_mut()
                .ok_or_else(|| WeaveError::Mcp("not connected".into()))?;
            conn.request(self.next_id(), method, params).await
        };

        let result = match tokio::time::timeout(timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(WeaveError::Mcp(format!(
                "'{}' timed out after {}s",
                method,
                timeout.as_secs_f32()
            ))),
        };

        // JSON-RPC errors leave the pipe usable; transport failures do not.
        match result {
            Ok(msg) => msg.into_result(),
            Err(e) => {
                warn!(command = %self.command, error = %e, "Resetting MCP stdio connection");
                *guard = None;
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_spawn_failure_is_mcp_error() {
        let transport = StdioTransport::new(
            "/definitely/not/a/real/mcp-server",
            vec![],
            HashMap::new(),
        );
        let err = transport
            .request("tools/list", None, Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, WeaveError::Mcp(_)));
        assert!(err.to_string().contains("failed to spawn"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_silent_server_times_out() {
        // `cat` echoes our request back; the echo carries a `method`, so it is
        // never taken for a response and the handshake waits until timeout.
        let transport = StdioTransport::new("cat", vec![], HashMap::new());
        let err = transport
            .request("tools/list", None, Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_scripted_server_round_trip() {
        // Minimal server: answer initialize (id 1), swallow the notification,
        // answer tools/list (id 2).
        let script = r#"
read -r _init
printf '%s\n' '{"jsonrpc":"2.0","id":1,"result":{"protocolVersion":"2025-03-26","capabilities":{}}}'
read -r _note
read -r _list
printf '%s\n' 'starting up...'
printf '%s\n' '{"jsonrpc":"2.0","id":2,"result":{"tools":[{"name":"echo"}]}}'
sleep 5
"#;
        let transport =
            StdioTransport::new("sh", vec!["-c".into(), script.into()], HashMap::new());
        let result = transport
            .request("tools/list", None, Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result["tools"][0]["name"], "echo");
    }
}
