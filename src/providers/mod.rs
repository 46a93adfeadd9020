//! Providers module - reasoning engines
//!
//! This module defines the `LLMProvider` trait the engine reasons through,
//! plus an OpenAI-compatible implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use toolweave::providers::{ChatOptions, LLMProvider, OpenAIProvider};
//! use toolweave::session::Message;
//!
//! async fn example() {
//!     let provider = OpenAIProvider::new("your-api-key");
//!     let messages = vec![Message::user("Hello!")];
//!     let options = ChatOptions::new().with_max_tokens(1000);
//!
//!     let response = provider.chat(messages, vec![], None, options).await.unwrap();
//!     println!("Response: {}", response.content);
//! }
//! ```

pub mod openai;
mod types;

use crate::config::Config;
use crate::error::{ProviderError, Result, WeaveError};

pub use openai::OpenAIProvider;
pub use types::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};

/// Parse an HTTP status code and response body into a structured [`ProviderError`].
pub fn parse_provider_error(status: u16, body: &str) -> ProviderError {
    match status {
        401 | 403 => ProviderError::Auth(body.to_string()),
        402 => ProviderError::Billing(body.to_string()),
        404 => ProviderError::ModelNotFound(body.to_string()),
        408 => ProviderError::Timeout(body.to_string()),
        429 => ProviderError::RateLimit(body.to_string()),
        400 | 422 => ProviderError::InvalidRequest(body.to_string()),
        500..=599 => ProviderError::ServerError(body.to_string()),
        _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
    }
}

/// Build the configured reasoning engine.
///
/// Fails with a configuration error when no API key is available.
pub fn provider_from_config(config: &Config) -> Result<OpenAIProvider> {
    let api_key = config
        .provider
        .api_key
        .as_deref()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| {
            WeaveError::Config(
                "no API key: set provider.api_key, TOOLWEAVE_PROVIDER_API_KEY or OPENAI_API_KEY"
                    .into(),
            )
        })?;

    OpenAIProvider::from_config(api_key, &config.provider, &config.agent.model)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_provider_error_auth() {
        let err = parse_provider_error(401, "invalid api key");
        assert!(matches!(err, ProviderError::Auth(_)));
        assert!(matches!(
            parse_provider_error(403, "forbidden"),
            ProviderError::Auth(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_rate_limit() {
        let err = parse_provider_error(429, "rate limited");
        assert!(matches!(err, ProviderError::RateLimit(_)));
        assert!(err.is_retryable());
    }

    #[test]
    fn test_parse_provider_error_client_errors() {
        assert!(matches!(
            parse_provider_error(400, "bad json"),
            ProviderError::InvalidRequest(_)
        ));
        assert!(matches!(
            parse_provider_error(404, "no such model"),
            ProviderError::ModelNotFound(_)
        ));
        assert!(matches!(
            parse_provider_error(402, "pay up"),
            ProviderError::Billing(_)
        ));
    }

    #[test]
    fn test_parse_provider_error_server() {
        for status in [500, 502, 503, 504] {
            let err = parse_provider_error(status, "down");
            assert!(matches!(err, ProviderError::ServerError(_)));
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn test_parse_provider_error_unknown() {
        let err = parse_provider_error(418, "i'm a teapot");
        assert!(matches!(err, ProviderError::Unknown(_)));
        assert!(err.to_string().contains("HTTP 418"));
    }

    #[test]
    fn test_provider_from_config_requires_key() {
        let mut config = Config::default();
        config.provider.api_key = None;
        assert!(matches!(
            provider_from_config(&config),
            Err(WeaveError::Config(_))
        ));

        config.provider.api_key = Some("sk-test".into());
        let provider = provider_from_config(&config).unwrap();
        assert_eq!(provider.default_model(), config.agent.model);
    }
}
