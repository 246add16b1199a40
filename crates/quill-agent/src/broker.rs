//! Tool dispatch.
//!
//! The model never touches the document store or repository directly: it
//! names a catalog tool and the broker forwards the request to the tool
//! execution endpoint. Every outcome, including transport failures, is
//! normalized into a [`ToolOutcome`] so the loop can hand it back to the
//! model.
//!
//! ```text
//! invocation ──sanitize_args──▶ POST endpoint {tool, args, documentId}
//!                                   │ 404
//!                                   ▼
//!                     POST {fallback_base_url}/{tool} (original args)
//! ```

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::catalog::{ToolInvocation, ToolName};
use crate::error::{AgentError, Result};

/// Characters of an error body kept in failure messages.
const ERROR_BODY_LIMIT: usize = 500;

// ─────────────────────────────────────────────────────────────────────────────
// Outcome
// ─────────────────────────────────────────────────────────────────────────────

/// Normalized result of one dispatch.
///
/// Serializes as `{success: true, tool, result}` or
/// `{success: false, tool, error, result: null}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    pub success: bool,
    pub tool: ToolName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub result: Value,
}

impl ToolOutcome {
    pub fn success(tool: ToolName, result: Value) -> Self {
        Self {
            success: true,
            tool,
            error: None,
            result,
        }
    }

    pub fn failure(tool: ToolName, error: impl Into<String>) -> Self {
        Self {
            success: false,
            tool,
            error: Some(error.into()),
            result: Value::Null,
        }
    }

    /// Message appended to the conversation after the dispatch.
    pub fn feedback_message(&self) -> String {
        if self.success {
            let result = serde_json::to_string_pretty(&self.result)
                .unwrap_or_else(|_| self.result.to_string());
            format!(
                "TOOL RESULT ({tool}): SUCCESS\n{result}\n\n\
                 Validate this result against your plan. Decide whether the task needs \
                 another tool call (nextStage \"toolUsed\"), more reasoning (\"reasoning\"), \
                 or is complete (\"summary\").",
                tool = self.tool,
            )
        } else {
            format!(
                "TOOL RESULT ({tool}): FAILED\nError: {error}\n\n\
                 The tool call failed. You MUST retry with different arguments or a \
                 different tool. Respond with stage \"toolUsed\" and nextStage \"toolUsed\".",
                tool = self.tool,
                error = self.error.as_deref().unwrap_or("unknown error"),
            )
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Dispatcher trait
// ─────────────────────────────────────────────────────────────────────────────

/// Something that can execute a catalog tool.
///
/// Implementations never fail: every problem is reported through
/// [`ToolOutcome::failure`].
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    async fn dispatch(&self, invocation: &ToolInvocation, document_id: &str) -> ToolOutcome;
}

pub type SharedDispatcher = Arc<dyn ToolDispatcher>;

// ─────────────────────────────────────────────────────────────────────────────
// HTTP broker
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for [`ToolBroker`].
#[derive(Debug, Clone)]
pub struct ToolBrokerConfig {
    /// Primary tool endpoint.
    pub endpoint: String,
    /// Base URL for the 404 fallback; `/{tool}` is appended.
    pub fallback_base_url: Option<String>,
    pub timeout: Duration,
}

impl ToolBrokerConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            fallback_base_url: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_fallback(mut self, base_url: impl Into<String>) -> Self {
        self.fallback_base_url = Some(base_url.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Dispatches tool invocations to the tool execution endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct ToolBroker {
    client: Client,
    config: ToolBrokerConfig,
}

impl ToolBroker {
    pub fn new(config: ToolBrokerConfig) -> Result<Self> {
        if config.endpoint.trim().is_empty() {
            return Err(AgentError::config("tool endpoint is empty"));
        }
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AgentError::config(format!("failed to create HTTP client: {}", e)))?;
        Ok(Self { client, config })
    }

    fn fallback_url(&self, tool: ToolName) -> Option<String> {
        self.config
            .fallback_base_url
            .as_deref()
            .map(|base| format!("{}/{}", base.trim_end_matches('/'), tool))
    }

    async fn post(
        &self,
        url: &str,
        body: &Value,
    ) -> std::result::Result<(StatusCode, String), reqwest::Error> {
        let response = self.client.post(url).json(body).send().await?;
        let status = response.status();
        let text = response.text().await?;
        Ok((status, text))
    }

    fn normalize(
        tool: ToolName,
        result: std::result::Result<(StatusCode, String), reqwest::Error>,
    ) -> ToolOutcome {
        match result {
            Ok((status, body)) if status.is_success() => {
                let value = if body.trim().is_empty() {
                    Value::Null
                } else {
                    serde_json::from_str(&body).unwrap_or(Value::String(body))
                };
                ToolOutcome::success(tool, value)
            }
            Ok((status, body)) => {
                let excerpt: String = body.chars().take(ERROR_BODY_LIMIT).collect();
                ToolOutcome::failure(tool, format!("HTTP {}: {}", status, excerpt))
            }
            Err(e) => ToolOutcome::failure(tool, format!("request failed: {}", e)),
        }
    }
}

#[async_trait]
impl ToolDispatcher for ToolBroker {
    async fn dispatch(&self, invocation: &ToolInvocation, document_id: &str) -> ToolOutcome {
        let tool = invocation.tool;
        let body = json!({
            "tool": tool,
            "args": sanitize_args(&invocation.args),
            "documentId": document_id,
        });

        debug!(tool = %tool, endpoint = %self.config.endpoint, "Dispatching tool");
        let mut result = self.post(&self.config.endpoint, &body).await;

        let not_found = matches!(&result, Ok((status, _)) if *status == StatusCode::NOT_FOUND);
        if not_found && let Some(url) = self.fallback_url(tool) {
            info!(tool = %tool, url = %url, "Primary tool endpoint returned 404, trying fallback");
            // The fallback receives the arguments exactly as the model wrote them.
            let fallback_body = json!({
                "tool": tool,
                "args": invocation.args,
                "documentId": document_id,
            });
            result = self.post(&url, &fallback_body).await;
        }

        let outcome = Self::normalize(tool, result);
        if let Some(ref error) = outcome.error {
            warn!(tool = %tool, error = %error, "Tool execution failed");
        } else {
            debug!(tool = %tool, "Tool execution succeeded");
        }
        outcome
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Argument sanitization
// ─────────────────────────────────────────────────────────────────────────────

/// Undo double-encoded arguments.
///
/// Models sometimes send `"args": "{\"query\": \"x\"}"` or wrap a value in a
/// ```` ```json ```` fence. Any string that parses as a JSON object or array
/// after fence removal is replaced by the parsed value, recursively.
pub fn sanitize_args(value: &Value) -> Value {
    match value {
        Value::String(s) => decode_nested(s).unwrap_or_else(|| value.clone()),
        Value::Array(items) => Value::Array(items.iter().map(sanitize_args).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), sanitize_args(v)))
                .collect(),
        ),
        other => other.clone(),
    }
}

fn decode_nested(s: &str) -> Option<Value> {
    let trimmed = s.trim();
    let candidate = if trimmed.starts_with("```") {
        quill_llm::unwrap_fence(trimmed)?
    } else {
        trimmed
    };
    if !(candidate.starts_with('{') || candidate.starts_with('[')) {
        return None;
    }
    match serde_json::from_str::<Value>(candidate) {
        Ok(parsed @ (Value::Object(_) | Value::Array(_))) => Some(sanitize_args(&parsed)),
        _ => None,
    }
}
