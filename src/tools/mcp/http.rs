//! MCP over streamable HTTP.
//!
//! Each request is a POST of one JSON-RPC message. The server answers either
//! with a JSON body or with a `text/event-stream` body carrying the response
//! as an SSE `data:` event. A session id handed out in the `mcp-session-id`
//! header is echoed on every later request.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{Result, WeaveError};

use super::protocol::{
    find_sse_response, initialize_params, JsonRpcMessage, JsonRpcNotification, JsonRpcRequest,
};

const HEADER_SESSION_ID: &str = "mcp-session-id";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Outcome of one POST.
enum Reply {
    Message(JsonRpcMessage),
    /// HTTP 404 for a request carrying a session id.
    SessionExpired,
}

#[derive(Default)]
struct SessionState {
    initialized: bool,
    session_id: Option<String>,
}

/// HTTP transport for one remote MCP server.
pub struct HttpTransport {
    client: Client,
    url: String,
    headers: HashMap<String, String>,
    next_id: AtomicU64,
    state: Mutex<SessionState>,
}

impl HttpTransport {
    pub fn new(url: &str, headers: HashMap<String, String>) -> Self {
        Self::with_client(Client::new(), url, headers)
    }

    pub fn with_client(client: Client, url: &str, headers: HashMap<String, String>) -> Self {
        Self {
            client,
            url: url.to_string(),
            headers,
            next_id: AtomicU64::new(1),
            state: Mutex::new(SessionState::default()),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn post<T: Serialize>(&self, body: &T, session_id: Option<&str>) -> reqwest::RequestBuilder {
        let mut req = self
            .client
            .post(&self.url)
            .header(ACCEPT, ACCEPT_BOTH)
            .header(CONTENT_TYPE, "application/json")
            .json(body);
        for (key, value) in &self.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if let Some(id) = session_id {
            req = req.header(HEADER_SESSION_ID, id);
        }
        req
    }

    async fn exchange(
        &self,
        state: &mut SessionState,
        method: &str,
        params: Option<Value>,
    ) -> Result<Reply> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = JsonRpcRequest::new(id, method, params);
        let response = self
            .post(&request, state.session_id.as_deref())
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND && state.session_id.is_some() {
            return Ok(Reply::SessionExpired);
        }

        if let Some(sid) = response
            .headers()
            .get(HEADER_SESSION_ID)
            .and_then(|v| v.to_str().ok())
        {
            state.session_id = Some(sid.to_string());
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeaveError::Mcp(format!(
                "{} returned HTTP {}: {}",
                method,
                status.as_u16(),
                body.trim()
            )));
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("text/event-stream"));
        let body = response.text().await?;

        let message = if is_sse {
            find_sse_response(&body, id).ok_or_else(|| {
                WeaveError::Mcp(format!("no response to '{}' in event stream", method))
            })?
        } else {
            serde_json::from_str::<JsonRpcMessage>(&body)?
        };
        Ok(Reply::Message(message))
    }

    async fn initialize(&self, state: &mut SessionState) -> Result<()> {
        match self
            .exchange(state, "initialize", Some(initialize_params()))
            .await?
        {
            Reply::Message(msg) => {
                msg.into_result()?;
            }
            Reply::SessionExpired => {
                return Err(WeaveError::Mcp("initialize rejected with HTTP 404".into()));
            }
        }

        let response = self
            .post(
                &JsonRpcNotification::new("notifications/initialized"),
                state.session_id.as_deref(),
            )
            .send()
            .await?;
        // Servers answer notifications with 202 Accepted and no body.
        debug!(status = response.status().as_u16(), "Sent initialized notification");

        state.initialized = true;
        info!(url = %self.url, session = ?state.session_id, "MCP http server initialized");
        Ok(())
    }

    /// Initialize if needed, then send `method`. A session the server no
    /// longer knows is replaced by a fresh one and the request sent again.
    async fn call(
        &self,
        state: &mut SessionState,
        method: &str,
        params: Option<Value>,
    ) -> Result<JsonRpcMessage> {
        for _ in 0..2 {
            if !state.initialized {
                self.initialize(state).await?;
            }
            match self.exchange(state, method, params.clone()).await? {
                Reply::Message(msg) => return Ok(msg),
                Reply::SessionExpired => {
                    warn!(url = %self.url, session = ?state.session_id, "MCP session expired, reinitializing");
                    *state = SessionState::default();
                }
            }
        }
        Err(WeaveError::Mcp(format!(
            "'{}' failed: server dropped the new session too",
            method
        )))
    }

    /// Send one request (initializing the session first if needed).
    ///
    /// Transport failures and timeouts clear the session, so the next
    /// request starts with a fresh handshake. JSON-RPC errors keep it.
    pub async fn request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout: Duration,
    ) -> Result<Value> {
        let mut state = self.state.lock().await;

        let result = match tokio::time::timeout(timeout, self.call(&mut state, method, params)).await
        {
            Ok(result) => result,
            Err(_) => Err(WeaveError::Mcp(format!(
                "'{}' timed out after {}s",
                method,
                timeout.as_secs_f32()
            ))),
        };

        match result {
            Ok(msg) => msg.into_result(),
            Err(e) => {
                warn!(url = %self.url, error = %e, "Resetting MCP http session");
                *state = SessionState::default();
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unreachable_server_is_error() {
        let transport = HttpTransport::new("http://127.0.0.1:9/mcp", HashMap::new());
        let result = transport
            .request("tools/list", None, Duration::from_secs(5))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_transport_failure_clears_session() {
        let transport = HttpTransport::new("http://127.0.0.1:9/mcp", HashMap::new());
        {
            let mut state = transport.state.lock().await;
            state.initialized = true;
            state.session_id = Some("stale".to_string());
        }

        let result = transport
            .request("tools/list", None, Duration::from_secs(5))
            .await;
        assert!(result.is_err());

        let state = transport.state.lock().await;
        assert!(!state.initialized);
        assert!(state.session_id.is_none());
    }

    #[test]
    fn test_custom_headers_are_sent() {
        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer t0k".to_string());
        let transport = HttpTransport::new("http://localhost:8000/mcp", headers);

        let req = transport
            .post(&JsonRpcRequest::new(1, "ping", None), Some("abc"))
            .build()
            .unwrap();
        assert_eq!(req.headers()["authorization"], "Bearer t0k");
        assert_eq!(req.headers()[HEADER_SESSION_ID], "abc");
        assert_eq!(req.headers()[ACCEPT], ACCEPT_BOTH);
        assert_eq!(transport.url(), "http://localhost:8000/mcp");
    }
}
