//! Credential data model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Identifier of a configured backend credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CredentialId(pub u64);

impl fmt::Display for CredentialId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CredentialId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Credential metadata and health. Never carries the secret.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Credential {
    pub id: CredentialId,
    /// Display name
    pub name: String,
    /// Provider label (openai, openrouter, deepseek, ...)
    pub provider: String,
    /// Base URL of the OpenAI-compatible API
    pub endpoint: String,
    /// Model identifier sent with every request
    pub model: String,
    /// Lower is preferred
    pub priority: i32,
    /// Default credentials rank ahead of everything else
    pub is_default: bool,
    pub enabled: bool,
    /// Extra attempts on this credential after the first one
    pub max_retries: u32,
    /// Consecutive failed candidacies
    pub failure_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}

impl Credential {
    /// Whether the credential is excluded at `now`
    pub fn in_cooldown_at(&self, now: DateTime<Utc>) -> bool {
        self.cooldown_until.is_some_and(|until| until > now)
    }

    pub fn in_cooldown(&self) -> bool {
        self.in_cooldown_at(Utc::now())
    }

    /// Sort key: default first, then priority ascending, then id ascending
    pub fn rank_key(&self) -> (bool, i32, CredentialId) {
        (!self.is_default, self.priority, self.id)
    }
}

/// Decrypted API secret. Redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Plaintext value, only for building a request
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret([REDACTED])")
    }
}

/// A credential together with its decrypted secret, held only for one call
#[derive(Debug, Clone)]
pub struct DecryptedCredential {
    pub credential: Credential,
    pub secret: Secret,
}

/// When repeated failures put a credential into cooldown
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CooldownPolicy {
    /// Failure count at which the cooldown starts
    pub threshold: u32,
    pub cooldown: Duration,
}

impl CooldownPolicy {
    /// Cooldown deadline for a credential that just reached `failure_count`
    pub fn cooldown_until(
        &self,
        failure_count: u32,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        if failure_count < self.threshold {
            return None;
        }
        chrono::Duration::from_std(self.cooldown)
            .ok()
            .map(|window| now + window)
    }
}

/// Health after a recorded failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CredentialHealth {
    pub failure_count: u32,
    pub cooldown_until: Option<DateTime<Utc>>,
}
