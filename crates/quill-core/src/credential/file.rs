//! Credentials file loading
//!
//! The file is a JSON array. Each entry carries either an inline `api_key` or the
//! name of an environment variable holding it (`api_key_env`).

use serde::Deserialize;
use std::path::Path;

use super::memory::InMemoryCredentialStore;
use super::types::{Credential, CredentialId, Secret};
use crate::error::{QuillError, QuillResult};

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    2
}

fn default_provider() -> String {
    "openai".to_string()
}

/// One credential as written in the credentials file
#[derive(Debug, Clone, Deserialize)]
pub struct CredentialRecord {
    pub id: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(alias = "base_url")]
    pub endpoint: String,
    #[serde(alias = "default_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub is_default: bool,
    #[serde(default = "default_true", alias = "is_enabled")]
    pub enabled: bool,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl CredentialRecord {
    fn resolve_secret(&self) -> QuillResult<Secret> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            return Ok(Secret::new(key));
        }
        if let Some(var) = &self.api_key_env {
            return std::env::var(var).map(Secret::new).map_err(|_| {
                QuillError::config_with_context(
                    format!("environment variable {} is not set", var),
                    format!("credential {}", self.id),
                )
            });
        }
        Err(QuillError::config_with_context(
            "credential has neither api_key nor api_key_env",
            format!("credential {}", self.id),
        ))
    }

    /// Split into stored metadata and secret
    pub fn into_parts(self) -> QuillResult<(Credential, Secret)> {
        let secret = self.resolve_secret()?;
        let credential = Credential {
            id: CredentialId(self.id),
            name: self.name.unwrap_or_else(|| format!("{}-{}", self.provider, self.id)),
            provider: self.provider,
            endpoint: self.endpoint.trim_end_matches('/').to_string(),
            model: self.model,
            priority: self.priority,
            is_default: self.is_default,
            enabled: self.enabled,
            max_retries: self.max_retries,
            failure_count: 0,
            cooldown_until: None,
        };
        Ok((credential, secret))
    }
}

/// Parse credential records from JSON text
pub fn parse_credentials(json: &str) -> QuillResult<Vec<CredentialRecord>> {
    serde_json::from_str(json)
        .map_err(|e| QuillError::config(format!("Invalid credentials file: {}", e)))
}

/// Load a credentials file into an in-memory store
pub fn load_credentials_file(path: impl AsRef<Path>) -> QuillResult<InMemoryCredentialStore> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| {
        QuillError::io_with_path(
            format!("Failed to read credentials file: {}", e),
            path.display().to_string(),
        )
    })?;

    let store = InMemoryCredentialStore::new();
    for record in parse_credentials(&content)? {
        let (credential, secret) = record.into_parts()?;
        store.insert(credential, secret);
    }
    tracing::info!(count = store.len(), path = %path.display(), "loaded credentials");
    Ok(store)
}
