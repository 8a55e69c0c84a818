//! Anthropic API client.
//!
//! This module provides:
//! - HTTP client for the Anthropic Messages API
//! - Request validation
//! - Status-code to [`ProviderError`] mapping
//!
//! The client makes exactly one HTTP attempt per call. Retry policy and
//! failure tracking belong to the coach pipeline, which needs to see every
//! failure to keep its breaker accurate.

#![allow(clippy::missing_errors_doc)]

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;

use super::config::ClientConfig;
use super::types::{ApiMessage, ApiRequest, ApiResponse};
use crate::error::ProviderError;
use crate::traits::LanguageModel;

/// Maximum content length per prompt (50KB).
pub const MAX_CONTENT_LENGTH: usize = 50_000;

/// Anthropic API version header value.
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Anthropic API client.
#[derive(Debug)]
pub struct AnthropicClient {
    client: Client,
    api_key: String,
    config: ClientConfig,
}

impl AnthropicClient {
    /// Create a new Anthropic client.
    pub fn new(api_key: impl Into<String>, config: ClientConfig) -> Result<Self, ProviderError> {
        let timeout = Duration::from_millis(config.timeout_ms);
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| ProviderError::Network {
                    message: format!("Failed to create HTTP client: {e}"),
                })?;

        Ok(Self {
            client,
            api_key: api_key.into(),
            config,
        })
    }

    /// Create a client with default configuration.
    pub fn with_api_key(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::new(api_key, ClientConfig::default())
    }

    /// Get the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.config.base_url
    }

    /// Get the client configuration.
    #[must_use]
    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Build the Messages API request for a system/user prompt pair.
    fn build_request(&self, system_prompt: &str, user_prompt: &str) -> ApiRequest {
        let mut request = ApiRequest::new(
            &self.config.model,
            self.config.max_tokens,
            vec![ApiMessage::user(user_prompt)],
        );
        if !system_prompt.is_empty() {
            request = request.with_system(system_prompt);
        }
        if let Some(temperature) = self.config.temperature {
            request = request.with_temperature(temperature);
        }
        request
    }

    /// Validate request size limits.
    fn validate_request(request: &ApiRequest) -> Result<(), ProviderError> {
        if request.messages.iter().all(|m| m.content.trim().is_empty()) {
            return Err(ProviderError::InvalidRequest {
                message: "Prompt must not be empty".to_string(),
            });
        }

        let system_len = request.system.as_ref().map_or(0, String::len);
        let longest = request
            .messages
            .iter()
            .map(|m| m.content.len())
            .chain(std::iter::once(system_len))
            .max()
            .unwrap_or(0);
        if longest > MAX_CONTENT_LENGTH {
            return Err(ProviderError::InvalidRequest {
                message: format!("Message too large: {longest} > {MAX_CONTENT_LENGTH}"),
            });
        }

        Ok(())
    }

    /// Send a request and return the concatenated response text.
    pub async fn send(&self, request: &ApiRequest) -> Result<String, ProviderError> {
        Self::validate_request(request)?;

        let url = format!("{}/messages", self.config.base_url);
        let start = Instant::now();

        tracing::debug!(
            url = %url,
            model = %request.model,
            max_tokens = request.max_tokens,
            timeout_ms = self.config.timeout_ms,
            "Starting Anthropic API request"
        );

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                let elapsed_ms = elapsed_millis(start);
                if e.is_timeout() {
                    tracing::error!(url = %url, elapsed_ms, "Anthropic API request timed out");
                    ProviderError::Timeout {
                        timeout_ms: self.config.timeout_ms,
                    }
                } else {
                    tracing::error!(url = %url, elapsed_ms, error = %e, "Anthropic API request failed");
                    ProviderError::Network {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        tracing::debug!(
            status = %status,
            elapsed_ms = elapsed_millis(start),
            "Anthropic API response received"
        );

        match status.as_u16() {
            401 | 403 => return Err(ProviderError::AuthenticationFailed),
            429 => {
                let retry_after = response
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(60);
                return Err(ProviderError::RateLimited {
                    retry_after_seconds: retry_after,
                });
            }
            529 => {
                return Err(ProviderError::ModelOverloaded {
                    model: request.model.clone(),
                })
            }
            _ => {}
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::UnexpectedResponse {
                message: format!("Status {status}: {body}"),
            });
        }

        let body: ApiResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::UnexpectedResponse {
                    message: format!("Failed to decode response body: {e}"),
                })?;

        let text = body.text();
        if text.trim().is_empty() {
            return Err(ProviderError::UnexpectedResponse {
                message: "No text content in response".to_string(),
            });
        }

        tracing::debug!(
            message_id = %body.id,
            input_tokens = body.usage.input_tokens,
            output_tokens = body.usage.output_tokens,
            "Anthropic API call succeeded"
        );
        Ok(text)
    }
}

#[allow(clippy::cast_possible_truncation)]
fn elapsed_millis(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

#[async_trait]
impl LanguageModel for AnthropicClient {
    async fn generate(
        &self,
        system_prompt: &str,
        user_prompt: &str,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(system_prompt, user_prompt);
        self.send(&request).await
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::unused_async
)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_client(server: &MockServer) -> AnthropicClient {
        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_timeout_ms(5_000);
        AnthropicClient::new("test-api-key", config).unwrap()
    }

    fn success_response_body(text: &str) -> serde_json::Value {
        json!({
            "id": "msg_123",
            "content": [{"type": "text", "text": text}],
            "model": "claude-3",
            "usage": {"input_tokens": 10, "output_tokens": 20},
            "stop_reason": "end_turn"
        })
    }

    #[test]
    fn test_client_new() {
        let client = AnthropicClient::with_api_key("test-key").unwrap();
        assert_eq!(client.base_url(), "https://api.anthropic.com/v1");
    }

    #[test]
    fn test_client_debug() {
        let client = AnthropicClient::with_api_key("test-key").unwrap();
        assert!(format!("{client:?}").contains("AnthropicClient"));
    }

    #[test]
    fn test_build_request_uses_config() {
        let config = ClientConfig::default()
            .with_model("claude-haiku")
            .with_max_tokens(300)
            .with_temperature(None);
        let client = AnthropicClient::new("k", config).unwrap();

        let request = client.build_request("system", "user");
        assert_eq!(request.model, "claude-haiku");
        assert_eq!(request.max_tokens, 300);
        assert_eq!(request.system.as_deref(), Some("system"));
        assert!(request.temperature.is_none());
        assert_eq!(request.messages, vec![ApiMessage::user("user")]);
    }

    #[test]
    fn test_build_request_omits_empty_system() {
        let client = AnthropicClient::with_api_key("k").unwrap();
        assert!(client.build_request("", "hello").system.is_none());
    }

    #[tokio::test]
    async fn test_generate_success() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/messages"))
            .and(header("x-api-key", "test-api-key"))
            .and(header("anthropic-version", ANTHROPIC_VERSION))
            .and(body_partial_json(json!({"system": "coach"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_response_body("Hello!")))
            .expect(1)
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let text = client.generate("coach", "Hi").await.unwrap();
        assert_eq!(text, "Hello!");
    }

    #[tokio::test]
    async fn test_generate_rejects_oversized_prompt_without_calling() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let large = "x".repeat(MAX_CONTENT_LENGTH + 1);
        let err = client.generate("coach", &large).await.unwrap_err();

        assert!(matches!(err, ProviderError::InvalidRequest { .. }));
        assert!(err.to_string().contains("Message too large"));
    }

    #[tokio::test]
    async fn test_generate_rejects_empty_prompt() {
        let server = MockServer::start().await;
        let client = create_mock_client(&server).await;

        let err = client.generate("coach", "   ").await.unwrap_err();
        assert!(matches!(err, ProviderError::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn test_auth_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let err = client.generate("s", "u").await.unwrap_err();
        assert_eq!(err, ProviderError::AuthenticationFailed);
    }

    #[tokio::test]
    async fn test_rate_limited_reads_retry_after() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(429)
                    .append_header("retry-after", "30")
                    .set_body_string("Rate limited"),
            )
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        match client.generate("s", "u").await.unwrap_err() {
            ProviderError::RateLimited {
                retry_after_seconds,
            } => assert_eq!(retry_after_seconds, 30),
            e => panic!("Wrong error type: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_model_overloaded() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(529))
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_model("claude-sonnet");
        let client = AnthropicClient::new("k", config).unwrap();
        match client.generate("s", "u").await.unwrap_err() {
            ProviderError::ModelOverloaded { model } => assert_eq!(model, "claude-sonnet"),
            e => panic!("Wrong error type: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_is_unexpected_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let err = client.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedResponse { .. }));
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_empty_content_is_unexpected_response() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "msg_123",
                "content": [],
                "model": "claude-3",
                "usage": {"input_tokens": 10, "output_tokens": 0},
                "stop_reason": "end_turn"
            })))
            .mount(&server)
            .await;

        let client = create_mock_client(&server).await;
        let err = client.generate("s", "u").await.unwrap_err();
        assert!(matches!(err, ProviderError::UnexpectedResponse { .. }));
    }

    #[tokio::test]
    async fn test_timeout_maps_to_timeout_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(success_response_body("late"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let config = ClientConfig::default()
            .with_base_url(server.uri())
            .with_timeout_ms(50);
        let client = AnthropicClient::new("k", config).unwrap();
        let err = client.generate("s", "u").await.unwrap_err();
        assert_eq!(err, ProviderError::Timeout { timeout_ms: 50 });
    }

    #[tokio::test]
    async fn test_arc_client_delegates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/messages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(success_response_body("ok")))
            .mount(&server)
            .await;

        let client = Arc::new(create_mock_client(&server).await);
        assert_eq!(client.generate("s", "u").await.unwrap(), "ok");
    }
}
