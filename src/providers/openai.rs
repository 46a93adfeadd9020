//! OpenAI-compatible reasoning engine
//!
//! Speaks the Chat Completions wire format, so it works against OpenAI
//! itself and any server exposing the same API (vLLM, Ollama, LiteLLM, ...).

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, Result, WeaveError};
use crate::session::{Message, Role};

use super::{
    parse_provider_error, ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition,
    Usage,
};

/// The OpenAI API endpoint URL.
const OPENAI_API_URL: &str = "https://api.openai.com/v1";

/// Model used when none is configured.
const DEFAULT_MODEL: &str = "gpt-4o-mini";

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<OpenAITool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct OpenAIMessage {
    role: &'static str,
    /// Null for assistant messages that only carry tool calls
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<OpenAIToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIToolCall {
    id: String,
    #[serde(default = "function_type")]
    r#type: String,
    function: OpenAIFunctionCall,
}

fn function_type() -> String {
    "function".to_string()
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIFunctionCall {
    name: String,
    /// JSON-encoded arguments
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Serialize)]
struct OpenAITool {
    r#type: &'static str,
    function: OpenAIFunctionDef,
}

#[derive(Debug, Serialize)]
struct OpenAIFunctionDef {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAIResponseMessage {
    content: Option<String>,
    tool_calls: Option<Vec<OpenAIToolCall>>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct OpenAIErrorResponse {
    error: OpenAIError,
}

#[derive(Debug, Deserialize)]
struct OpenAIError {
    message: String,
}

// ============================================================================
// OpenAI Provider
// ============================================================================

/// OpenAI-compatible reasoning engine.
pub struct OpenAIProvider {
    api_key: String,
    api_base: String,
    model: String,
    client: Client,
}

impl OpenAIProvider {
    /// Create a provider for the public OpenAI endpoint.
    ///
    /// # Example
    /// ```
    /// use toolweave::providers::{LLMProvider, OpenAIProvider};
    ///
    /// let provider = OpenAIProvider::new("sk-xxx");
    /// assert_eq!(provider.name(), "openai");
    /// ```
    pub fn new(api_key: &str) -> Self {
        Self::with_client(api_key, OPENAI_API_URL, Client::new())
    }

    /// Create a provider for an OpenAI-compatible server.
    ///
    /// A trailing slash on `api_base` is ignored.
    pub fn with_base_url(api_key: &str, api_base: &str) -> Self {
        Self::with_client(api_key, api_base, Client::new())
    }

    /// Create a provider with a custom HTTP client.
    pub fn with_client(api_key: &str, api_base: &str, client: Client) -> Self {
        Self {
            api_key: api_key.to_string(),
            api_base: api_base.trim_end_matches('/').to_string(),
            model: DEFAULT_MODEL.to_string(),
            client,
        }
    }

    /// Create a provider from configuration, applying the request timeout.
    pub fn from_config(api_key: &str, config: &ProviderConfig, model: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()
            .map_err(|e| WeaveError::Config(format!("cannot build HTTP client: {}", e)))?;
        let api_base = config.api_base.as_deref().unwrap_or(OPENAI_API_URL);
        Ok(Self::with_client(api_key, api_base, client).with_model(model))
    }

    /// Override the default model.
    pub fn with_model(mut self, model: &str) -> Self {
        if !model.is_empty() {
            self.model = model.to_string();
        }
        self
    }
}

// ============================================================================
// Conversion Functions
// ============================================================================

fn convert_messages(messages: Vec<Message>) -> Vec<OpenAIMessage> {
    messages
        .into_iter()
        .map(|msg| {
            let role = match msg.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };

            let tool_calls = msg.tool_calls.map(|tcs| {
                tcs.into_iter()
                    .map(|tc| OpenAIToolCall {
                        id: tc.id,
                        r#type: function_type(),
                        function: OpenAIFunctionCall {
                            name: tc.name,
                            arguments: tc.arguments,
                        },
                    })
                    .collect()
            });

            OpenAIMessage {
                role,
                content: if msg.content.is_empty() && tool_calls.is_some() {
                    None
                } else {
                    Some(msg.content)
                },
                tool_calls,
                tool_call_id: msg.tool_call_id,
            }
        })
        .collect()
}

fn convert_tools(tools: Vec<ToolDefinition>) -> Vec<OpenAITool> {
    tools
        .into_iter()
        .map(|t| OpenAITool {
            r#type: "function",
            function: OpenAIFunctionDef {
                name: t.name,
                description: t.description,
                parameters: t.parameters,
            },
        })
        .collect()
}

fn convert_response(response: OpenAIResponse) -> Result<LLMResponse> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| WeaveError::Provider("response contained no choices".into()))?;

    let content = choice.message.content.unwrap_or_default();
    let tool_calls: Vec<LLMToolCall> = choice
        .message
        .tool_calls
        .unwrap_or_default()
        .into_iter()
        .map(|tc| {
            // Some servers send "" for calls without arguments.
            let args = if tc.function.arguments.trim().is_empty() {
                "{}"
            } else {
                tc.function.arguments.as_str()
            };
            LLMToolCall::new(&tc.id, &tc.function.name, args)
        })
        .collect();

    let mut llm_response = LLMResponse::with_tools(&content, tool_calls);
    if let Some(usage) = response.usage {
        llm_response =
            llm_response.with_usage(Usage::new(usage.prompt_tokens, usage.completion_tokens));
    }
    Ok(llm_response)
}

fn transport_error(e: reqwest::Error) -> WeaveError {
    if e.is_timeout() {
        ProviderError::Timeout(e.to_string()).into()
    } else {
        WeaveError::Provider(format!("request failed: {}", e))
    }
}

// ============================================================================
// LLMProvider Implementation
// ============================================================================

#[async_trait]
impl LLMProvider for OpenAIProvider {
    async fn chat(
        &self,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        model: Option<&str>,
        options: ChatOptions,
    ) -> Result<LLMResponse> {
        let model = model.unwrap_or(self.model.as_str());
        let request = OpenAIRequest {
            model: model.to_string(),
            messages: convert_messages(messages),
            tools: if tools.is_empty() {
                None
            } else {
                Some(convert_tools(tools))
            },
            max_tokens: options.max_tokens,
            temperature: options.temperature,
            stop: options.stop,
        };

        debug!(model = %model, messages = request.messages.len(), "OpenAI request");

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<OpenAIErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!(status = status.as_u16(), "OpenAI API error");
            return Err(parse_provider_error(status.as_u16(), &detail).into());
        }

        let body = response.text().await.map_err(transport_error)?;
        let parsed: OpenAIResponse = serde_json::from_str(&body)
            .map_err(|e| WeaveError::Provider(format!("malformed response: {}", e)))?;
        convert_response(parsed)
    }

    fn default_model(&self) -> &str {
        &self.model
    }

    fn name(&self) -> &str {
        "openai"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;

    #[test]
    fn test_openai_provider_creation() {
        let provider = OpenAIProvider::new("test-key");
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.default_model(), DEFAULT_MODEL);
        assert_eq!(provider.api_base, OPENAI_API_URL);
    }

    #[test]
    fn test_from_config() {
        let config = ProviderConfig {
            api_key: None,
            api_base: Some("http://localhost:11434/v1/".into()),
            timeout_secs: 5,
        };
        let provider = OpenAIProvider::from_config("k", &config, "llama3").unwrap();
        assert_eq!(provider.api_base, "http://localhost:11434/v1");
        assert_eq!(provider.default_model(), "llama3");
    }

    #[test]
    fn test_convert_messages_with_tool_calls() {
        let messages = vec![
            Message::system("You are helpful"),
            Message::assistant_with_tools("", vec![ToolCall::new("call_1", "add", r#"{"a":3,"b":4}"#)]),
            Message::tool_result("call_1", "7"),
        ];
        let converted = convert_messages(messages);

        assert_eq!(converted[0].role, "system");
        assert_eq!(converted[1].role, "assistant");
        assert!(converted[1].content.is_none());
        let calls = converted[1].tool_calls.as_ref().unwrap();
        assert_eq!(calls[0].r#type, "function");
        assert_eq!(calls[0].function.name, "add");
        assert_eq!(converted[2].role, "tool");
        assert_eq!(converted[2].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn test_convert_tools() {
        let tools = vec![ToolDefinition::new(
            "add",
            "Adds a and b",
            serde_json::json!({"type": "object"}),
        )];
        let converted = convert_tools(tools);
        assert_eq!(converted[0].r#type, "function");
        assert_eq!(converted[0].function.description, "Adds a and b");
    }

    #[test]
    fn test_convert_response_parses_wire_json() {
        let body = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [
                        {"id": "call_1", "type": "function", "function": {"name": "add", "arguments": "{\"a\":3,\"b\":4}"}},
                        {"id": "call_2", "type": "function", "function": {"name": "noop", "arguments": ""}}
                    ]
                }
            }],
            "usage": {"prompt_tokens": 12, "completion_tokens": 3, "total_tokens": 15}
        }"#;
        let parsed: OpenAIResponse = serde_json::from_str(body).unwrap();
        let converted = convert_response(parsed).unwrap();

        assert_eq!(converted.content, "");
        assert_eq!(converted.tool_calls.len(), 2);
        assert_eq!(converted.tool_calls[0].arguments, r#"{"a":3,"b":4}"#);
        assert_eq!(converted.tool_calls[1].arguments, "{}");
        assert_eq!(converted.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_convert_response_empty_choices_is_error() {
        let response = OpenAIResponse {
            choices: vec![],
            usage: None,
        };
        assert!(matches!(
            convert_response(response),
            Err(WeaveError::Provider(_))
        ));
    }

    #[test]
    fn test_request_serialization_skips_none() {
        let request = OpenAIRequest {
            model: "gpt-4o-mini".to_string(),
            messages: convert_messages(vec![Message::user("Hello")]),
            tools: None,
            max_tokens: Some(100),
            temperature: None,
            stop: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("max_tokens"));
        assert!(!json.contains("temperature"));
        assert!(!json.contains("tools"));
        assert!(!json.contains("tool_call_id"));
    }

    #[tokio::test]
    async fn test_unreachable_server_is_provider_error() {
        let provider = OpenAIProvider::with_base_url("k", "http://127.0.0.1:9");
        let err = provider
            .chat(vec![Message::user("hi")], vec![], None, ChatOptions::new())
            .await
            .unwrap_err();
        assert!(err.is_turn_failure());
    }
}
