//! Configuration system for the Quill document orchestrator.
//!
//! Provides TOML-based configuration with:
//! - One section per concern (`[llm]`, `[tools]`, `[agent]`, `[generation]`, `[cache]`)
//! - Config file layering (user config dir + project-local `quill.toml`)
//! - `QUILL_*` environment overrides for endpoints and model

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigSource, LoadedConfig, load_config, load_config_file, load_config_with_options,
    load_explicit, log_dir, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
