//! Configuration types mapping to the TOML schema.
//!
//! ```toml
//! [llm]          # completion endpoint and model
//! [tools]        # tool execution endpoint and 404 fallback
//! [agent]        # stage loop limits
//! [generation]   # token budgets and truncation caps
//! [cache]        # repository-context cache policy
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ConfigError, Result};

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// All sections are optional so that partial configs (e.g. a project-local
/// `quill.toml` that only sets the model) can be loaded and merged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuillConfig {
    pub llm: Option<LlmConfig>,
    pub tools: Option<ToolsConfig>,
    pub agent: Option<AgentConfig>,
    pub generation: Option<GenerateConfig>,
    pub cache: Option<CacheConfig>,
}

impl QuillConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    ///
    /// Merging is per section: a section present in `other` replaces the
    /// whole section here.
    pub fn merge(&mut self, other: QuillConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }
        if other.tools.is_some() {
            self.tools = other.tools;
        }
        if other.agent.is_some() {
            self.agent = other.agent;
        }
        if other.generation.is_some() {
            self.generation = other.generation;
        }
        if other.cache.is_some() {
            self.cache = other.cache;
        }
    }

    /// Apply environment overrides through a lookup function.
    ///
    /// Recognized keys: `QUILL_LLM_ENDPOINT`, `QUILL_LLM_MODEL`,
    /// `QUILL_TOOLS_ENDPOINT`. Empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(endpoint) = get(ENV_LLM_ENDPOINT) {
            self.llm.get_or_insert_with(LlmConfig::default).endpoint = Some(endpoint);
        }
        if let Some(model) = get(ENV_LLM_MODEL) {
            self.llm.get_or_insert_with(LlmConfig::default).model = model;
        }
        if let Some(endpoint) = get(ENV_TOOLS_ENDPOINT) {
            self.tools.get_or_insert_with(ToolsConfig::default).endpoint = Some(endpoint);
        }
    }

    pub fn llm(&self) -> LlmConfig {
        self.llm.clone().unwrap_or_default()
    }

    pub fn tools(&self) -> ToolsConfig {
        self.tools.clone().unwrap_or_default()
    }

    pub fn agent(&self) -> AgentConfig {
        self.agent.clone().unwrap_or_default()
    }

    pub fn generation(&self) -> GenerateConfig {
        self.generation.clone().unwrap_or_default()
    }

    pub fn cache(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }

    /// Check value ranges across all sections.
    pub fn validate(&self) -> Result<()> {
        let llm = self.llm();
        if let Some(t) = llm.temperature
            && !(0.0..=2.0).contains(&t)
        {
            return Err(ConfigError::invalid("llm.temperature", "must be within 0.0..=2.0"));
        }
        if llm.timeout_secs == 0 {
            return Err(ConfigError::invalid("llm.timeout_secs", "must be positive"));
        }

        let agent = self.agent();
        if agent.max_parse_failures == 0 {
            return Err(ConfigError::invalid("agent.max_parse_failures", "must be positive"));
        }
        if agent.max_turns == 0 {
            return Err(ConfigError::invalid("agent.max_turns", "must be positive"));
        }

        let generation = self.generation();
        if generation.max_rounds == 0 {
            return Err(ConfigError::invalid("generation.max_rounds", "must be positive"));
        }
        if generation.file_char_cap == 0 {
            return Err(ConfigError::invalid("generation.file_char_cap", "must be positive"));
        }

        if self.cache().max_entries == 0 {
            return Err(ConfigError::invalid("cache.max_entries", "must be positive"));
        }

        Ok(())
    }
}

/// Env var overriding `llm.endpoint`.
pub const ENV_LLM_ENDPOINT: &str = "QUILL_LLM_ENDPOINT";
/// Env var overriding `llm.model`.
pub const ENV_LLM_MODEL: &str = "QUILL_LLM_MODEL";
/// Env var overriding `tools.endpoint`.
pub const ENV_TOOLS_ENDPOINT: &str = "QUILL_TOOLS_ENDPOINT";

// ─────────────────────────────────────────────────────────────────────────────
// LLM
// ─────────────────────────────────────────────────────────────────────────────

/// Completion endpoint configuration.
///
/// ```toml
/// [llm]
/// endpoint = "https://llm.internal/v1/complete"
/// model = "gemini-1.5-pro"
/// api_key_env = "QUILL_LLM_API_KEY"
/// temperature = 0.4
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Full URL of the completion endpoint.
    pub endpoint: Option<String>,
    /// Model identifier passed through on every request.
    pub model: String,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    pub temperature: Option<f32>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "gemini-1.5-pro".to_string(),
            api_key_env: None,
            temperature: None,
            timeout_secs: 120,
            max_retries: 3,
            retry_backoff_ms: 500,
        }
    }
}

impl LlmConfig {
    /// Endpoint, or an error naming the missing field.
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ConfigError::missing("endpoint", "[llm]"))
    }

    /// Resolve the API key from the configured environment variable.
    pub fn api_key(&self) -> Option<String> {
        let var = self.api_key_env.as_deref()?;
        std::env::var(var).ok().filter(|k| !k.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

/// Tool execution endpoint configuration.
///
/// ```toml
/// [tools]
/// endpoint = "https://api.internal/agent/tools"
/// fallback_base_url = "https://tools.internal"
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Primary tool endpoint; receives `{tool, args, documentId}`.
    pub endpoint: Option<String>,
    /// Base URL tried with `/<tool>` appended when the primary returns 404.
    pub fallback_base_url: Option<String>,
    pub timeout_secs: u64,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            fallback_base_url: None,
            timeout_secs: 60,
        }
    }
}

impl ToolsConfig {
    pub fn require_endpoint(&self) -> Result<&str> {
        self.endpoint
            .as_deref()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| ConfigError::missing("endpoint", "[tools]"))
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Agent
// ─────────────────────────────────────────────────────────────────────────────

/// Stage loop limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Tool dispatches allowed per run before the loop is steered to summary.
    pub max_tool_calls: usize,
    /// Consecutive unparsable replies before the run errors out.
    pub max_parse_failures: usize,
    /// Hard ceiling on LLM turns per run.
    pub max_turns: usize,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_calls: 50,
            max_parse_failures: 3,
            max_turns: 100,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Generation
// ─────────────────────────────────────────────────────────────────────────────

/// Token budgets and truncation caps for the one-shot generation paths.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerateConfig {
    /// Budget for file-selection and section-planning calls.
    pub planning_budget: u32,
    /// Budget for each section body.
    pub section_budget: u32,
    /// Budget for each negotiation round.
    pub negotiation_budget: u32,
    /// Characters kept from each fetched file.
    pub file_char_cap: usize,
    pub readme_excerpt_chars: usize,
    /// Tree entries listed in prompts.
    pub tree_entry_limit: usize,
    /// Negotiation round cap.
    pub max_rounds: usize,
    /// Characters of already-generated sections shown for continuity.
    pub preview_chars: usize,
    pub max_selected_files: usize,
    pub max_sections: usize,
}

impl Default for GenerateConfig {
    fn default() -> Self {
        Self {
            planning_budget: 1024,
            section_budget: 8192,
            negotiation_budget: 8192,
            file_char_cap: 6000,
            readme_excerpt_chars: 2000,
            tree_entry_limit: 400,
            max_rounds: 10,
            preview_chars: 1500,
            max_selected_files: 8,
            max_sections: 8,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Cache
// ─────────────────────────────────────────────────────────────────────────────

/// Repository-context cache policy.
///
/// ```toml
/// [cache]
/// max_entries = 64
/// ttl_secs = 3600   # omit to keep entries for the process lifetime
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub max_entries: usize,
    pub ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: 64,
            ttl_secs: None,
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}
