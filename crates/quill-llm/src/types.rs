//! Request and response types for the completion endpoint.
//!
//! The wire shape is deliberately small: one flattened prompt in, one block
//! of text out.
//!
//! ```json
//! {"prompt": "...", "model": "...", "generationConfig": {"temperature": 0.4, "maxOutputTokens": 2048}}
//! ```

use serde::{Deserialize, Serialize};

/// Per-call generation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    pub max_output_tokens: u32,
}

/// A completion request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub prompt: String,
    pub model: String,
    pub generation_config: GenerationConfig,
}

impl CompletionRequest {
    /// Create a request with the given output token budget.
    pub fn new(
        model: impl Into<String>,
        prompt: impl Into<String>,
        max_output_tokens: u32,
    ) -> Self {
        Self {
            prompt: prompt.into(),
            model: model.into(),
            generation_config: GenerationConfig {
                temperature: None,
                max_output_tokens,
            },
        }
    }

    /// Set the sampling temperature.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.generation_config.temperature = Some(temperature);
        self
    }

    /// Set the temperature only when one is configured.
    pub fn with_optional_temperature(mut self, temperature: Option<f32>) -> Self {
        self.generation_config.temperature = temperature;
        self
    }

    /// The output token budget for this call.
    pub fn max_output_tokens(&self) -> u32 {
        self.generation_config.max_output_tokens
    }
}

/// A completion response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionResponse {
    pub text: String,
}

impl CompletionResponse {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
