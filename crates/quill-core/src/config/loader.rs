//! Configuration loading
//!
//! Sources are applied in the order they were added; later sources win.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::engine::EngineConfig;
use crate::error::{QuillError, QuillResult};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "QUILL_";

/// Source of configuration data
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Configuration from a JSON file
    File(PathBuf),
    /// `QUILL_*` variables from the process environment
    Environment,
    /// Explicit key/value overrides, same keys as the environment without prefix
    Overrides(HashMap<String, String>),
    /// Default configuration
    Default,
}

/// Configuration loader with support for multiple sources
#[derive(Debug, Default)]
pub struct ConfigLoader {
    sources: Vec<ConfigSource>,
}

impl ConfigLoader {
    /// Create a new config loader
    pub fn new() -> Self {
        Self {
            sources: Vec::new(),
        }
    }

    /// Add a configuration source
    pub fn add_source(mut self, source: ConfigSource) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a file source
    pub fn with_file<P: AsRef<Path>>(self, path: P) -> Self {
        self.add_source(ConfigSource::File(path.as_ref().to_path_buf()))
    }

    /// Add environment variables source
    pub fn with_env(self) -> Self {
        self.add_source(ConfigSource::Environment)
    }

    /// Add default configuration source
    pub fn with_defaults(self) -> Self {
        self.add_source(ConfigSource::Default)
    }

    /// Add explicit overrides
    pub fn with_overrides(self, overrides: HashMap<String, String>) -> Self {
        self.add_source(ConfigSource::Overrides(overrides))
    }

    /// Load configuration from all sources
    pub fn load(self) -> QuillResult<EngineConfig> {
        let mut config = EngineConfig::default();

        for source in &self.sources {
            match source {
                ConfigSource::Default => config = EngineConfig::default(),
                ConfigSource::File(path) => {
                    config = load_file(path)?;
                    tracing::debug!(path = %path.display(), "loaded engine config file");
                }
                ConfigSource::Environment => {
                    let vars = std::env::vars().filter_map(|(key, value)| {
                        key.strip_prefix(ENV_PREFIX)
                            .map(|stripped| (stripped.to_string(), value))
                    });
                    apply_overrides(&mut config, vars)?;
                }
                ConfigSource::Overrides(map) => {
                    apply_overrides(&mut config, map.clone())?;
                }
            }
        }

        config.validate()?;
        Ok(config)
    }
}

fn load_file(path: &Path) -> QuillResult<EngineConfig> {
    let content = fs::read_to_string(path).map_err(|e| {
        QuillError::io_with_path(
            format!("Failed to read config file: {}", e),
            path.display().to_string(),
        )
    })?;
    serde_json::from_str(&content).map_err(|e| {
        QuillError::config_with_context(
            format!("Invalid config file: {}", e),
            path.display().to_string(),
        )
    })
}

/// Apply `KEY=value` overrides (keys without the `QUILL_` prefix)
pub fn apply_overrides<I>(config: &mut EngineConfig, vars: I) -> QuillResult<()>
where
    I: IntoIterator<Item = (String, String)>,
{
    for (key, value) in vars {
        match key.to_ascii_uppercase().as_str() {
            "SESSION_TIMEOUT" => config.session_timeout = parse_duration(&key, &value)?,
            "FAILURE_COOLDOWN" => config.failure_cooldown = parse_duration(&key, &value)?,
            "CONNECT_TIMEOUT" => config.connect_timeout = parse_duration(&key, &value)?,
            "MAX_FALLBACK_PROVIDERS" => {
                config.max_fallback_providers = parse_number(&key, &value)?
            }
            "FAILURE_THRESHOLD" => config.failure_threshold = parse_number(&key, &value)?,
            "MAX_TOKENS" => config.max_tokens = parse_number(&key, &value)?,
            "LOG_LEVEL" => config.logging.level = value,
            "LOG_FORMAT" => config.logging.format = value,
            _ => {}
        }
    }
    Ok(())
}

fn parse_duration(key: &str, value: &str) -> QuillResult<Duration> {
    humantime_serde::deserialize(serde_json::Value::String(value.to_string())).map_err(
        |e: serde_json::Error| {
            QuillError::config_with_context(
                format!("Invalid duration '{}': {}", value, e),
                format!("{}{}", ENV_PREFIX, key),
            )
        },
    )
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> QuillResult<T> {
    value.trim().parse::<T>().map_err(|_| {
        QuillError::config_with_context(
            format!("Invalid number '{}'", value),
            format!("{}{}", ENV_PREFIX, key),
        )
    })
}
