//! HTTP completion backend.
//!
//! Posts [`CompletionRequest`] JSON to a single completion endpoint and reads
//! `{"text": "..."}` back. The endpoint is usually a thin proxy in front of
//! the actual model provider, so no provider-specific shapes leak in here.

use async_trait::async_trait;
use reqwest::{Client, Response, header};
use std::time::Duration;

use crate::backend::{LlmBackend, with_retry};
use crate::error::{LlmError, RateLimitInfo, Result};
use crate::types::{CompletionRequest, CompletionResponse};

/// Default timeout for requests.
const DEFAULT_TIMEOUT_SECS: u64 = 120;

// ─────────────────────────────────────────────────────────────────────────────
// Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for the HTTP completion backend.
#[derive(Debug, Clone)]
pub struct HttpBackendConfig {
    /// Full URL of the completion endpoint.
    pub endpoint: String,

    /// Optional bearer token.
    pub api_key: Option<String>,

    /// Request timeout.
    pub timeout: Duration,

    /// Maximum retries for transient errors.
    pub max_retries: u32,

    /// Initial backoff duration for retries.
    pub retry_backoff: Duration,

    /// Name for this backend instance.
    pub name: String,
}

impl HttpBackendConfig {
    /// Create a config for the given endpoint with default retry settings.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: None,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_retries: 3,
            retry_backoff: Duration::from_millis(500),
            name: "http".to_string(),
        }
    }

    /// Set the bearer token.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set max retries.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Set the initial retry backoff.
    pub fn with_retry_backoff(mut self, backoff: Duration) -> Self {
        self.retry_backoff = backoff;
        self
    }

    /// Set the backend name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP Backend
// ─────────────────────────────────────────────────────────────────────────────

/// Completion backend speaking the `{prompt, model, generationConfig}` protocol.
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    /// Create a new backend with the given configuration.
    pub fn new(config: HttpBackendConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(LlmError::Config("completion endpoint is empty".to_string()));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| LlmError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Add authentication headers to a request.
    fn add_headers(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.header(header::CONTENT_TYPE, "application/json");

        match self.config.api_key {
            Some(ref api_key) => {
                builder.header(header::AUTHORIZATION, format!("Bearer {}", api_key))
            }
            None => builder,
        }
    }

    /// Handle a successful response.
    async fn handle_response(response: Response) -> Result<CompletionResponse> {
        if !response.status().is_success() {
            return Err(Self::handle_error_response(response).await);
        }

        let body = response.text().await?;
        let parsed: CompletionResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::Serialization(e.to_string()))?;

        Ok(parsed)
    }

    /// Handle an error response.
    async fn handle_error_response(response: Response) -> LlmError {
        let status = response.status();
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response.text().await.unwrap_or_default();

        match status.as_u16() {
            401 | 403 => LlmError::Auth(format!("HTTP {}: {}", status, body)),
            429 => LlmError::RateLimit(RateLimitInfo::from_header(body, retry_after.as_deref())),
            502..=504 => LlmError::Network(format!("HTTP {}: {}", status, body)),
            500..=599 => LlmError::Backend(format!("Server error: {}", body)),
            _ => LlmError::Backend(format!("HTTP {}: {}", status, body)),
        }
    }
}

#[async_trait]
impl LlmBackend for HttpBackend {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        tracing::debug!(
            backend = %self.config.name,
            model = %request.model,
            max_output_tokens = request.max_output_tokens(),
            prompt_chars = request.prompt.len(),
            "Sending completion request"
        );

        with_retry(
            self.config.max_retries,
            self.config.retry_backoff,
            &self.config.name,
            || async {
                let response = self
                    .add_headers(self.client.post(&self.config.endpoint))
                    .json(&request)
                    .send()
                    .await?;

                Self::handle_response(response).await
            },
        )
        .await
    }

    fn name(&self) -> &str {
        &self.config.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header as header_eq, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn backend_for(server: &MockServer) -> HttpBackend {
        HttpBackend::new(
            HttpBackendConfig::new(format!("{}/v1/complete", server.uri()))
                .with_api_key("secret")
                .with_max_retries(1)
                .with_retry_backoff(Duration::from_millis(1)),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_complete_posts_wire_shape() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/complete"))
            .and(header_eq("authorization", "Bearer secret"))
            .and(body_partial_json(serde_json::json!({
                "model": "m1",
                "generationConfig": {"maxOutputTokens": 1024}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"text": "hi"})))
            .expect(1)
            .mount(&server)
            .await;

        let response = backend_for(&server)
            .complete(CompletionRequest::new("m1", "hello", 1024))
            .await
            .unwrap();
        assert_eq!(response.text, "hi");
    }

    #[tokio::test]
    async fn test_unauthorized_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let result = backend_for(&server)
            .complete(CompletionRequest::new("m", "p", 10))
            .await;
        assert!(matches!(result, Err(LlmError::Auth(_))));
    }

    #[tokio::test]
    async fn test_gateway_error_is_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(2)
            .mount(&server)
            .await;

        let result = backend_for(&server)
            .complete(CompletionRequest::new("m", "p", 10))
            .await;
        assert!(matches!(result, Err(LlmError::Network(_))));
    }

    #[tokio::test]
    async fn test_malformed_body_is_serialization_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let result = backend_for(&server)
            .complete(CompletionRequest::new("m", "p", 10))
            .await;
        assert!(matches!(result, Err(LlmError::Serialization(_))));
    }

    #[test]
    fn test_empty_endpoint_rejected() {
        assert!(matches!(
            HttpBackend::new(HttpBackendConfig::new("  ")),
            Err(LlmError::Config(_))
        ));
    }
}
