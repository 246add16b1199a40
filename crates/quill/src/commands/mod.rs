//! CLI command handlers.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context as _, Result};
use tracing::warn;

use quill_config::{LlmConfig, LoadedConfig};
use quill_llm::{HttpBackend, HttpBackendConfig, SharedBackend};

pub mod agent;
pub mod config;
pub mod generate;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, bypassing discovery.
    pub config_path: Option<PathBuf>,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the effective configuration.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = match &self.config_path {
            Some(path) => quill_config::load_explicit(path)
                .with_context(|| format!("loading config from {}", path.display()))?,
            None => quill_config::load_config(None).context("loading configuration")?,
        };
        for warning in &loaded.warnings {
            warn!("{}", warning);
        }
        Ok(loaded)
    }
}

/// HTTP completion backend from the `[llm]` section.
pub fn build_backend(llm: &LlmConfig) -> Result<SharedBackend> {
    let mut config = HttpBackendConfig::new(llm.require_endpoint()?)
        .with_timeout(llm.timeout())
        .with_max_retries(llm.max_retries)
        .with_retry_backoff(llm.retry_backoff());
    if let Some(key) = llm.api_key() {
        config = config.with_api_key(key);
    }
    Ok(Arc::new(HttpBackend::new(config)?))
}
