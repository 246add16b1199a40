//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `$QUILL_CONFIG_DIR/config.toml` or the platform config dir
//! 2. `./quill.toml` (project-local)
//! 3. `QUILL_*` environment overrides
//!
//! An explicit `--config <path>` replaces steps 1 and 2.

use std::path::{Path, PathBuf};

use crate::{ConfigError, QuillConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "quill.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "quill";

/// Environment variable to override the config directory.
const CONFIG_DIR_ENV: &str = "QUILL_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: QuillConfig,
    /// Sources that were checked, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Problems that did not stop loading (malformed layers, etc.).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Discover, merge, and apply environment overrides.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `QUILL_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = QuillConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load a single explicitly named file, then apply environment overrides.
///
/// Unlike discovery, a missing or malformed file is an error.
pub fn load_explicit(path: &Path) -> Result<LoadedConfig> {
    let mut config = load_config_file(path)?;
    config.apply_env(|key| std::env::var(key).ok());
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources: vec![ConfigSource {
            path: path.to_path_buf(),
            loaded: true,
        }],
        warnings: Vec::new(),
    })
}

/// Load config from a specific file path (no discovery, no env).
pub fn load_config_file(path: &Path) -> Result<QuillConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    QuillConfig::from_toml(&contents)
}

/// User config file path.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory.
///
/// Checks `QUILL_CONFIG_DIR` first, then falls back to the platform default
/// (`~/.config/quill` on Linux).
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Directory for rolling log files.
pub fn log_dir() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join("logs"))
}

/// Try to load a config file and merge it into the existing config.
fn load_layer(config: &mut QuillConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            tracing::debug!(path = %path.display(), "Loaded config layer");
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
