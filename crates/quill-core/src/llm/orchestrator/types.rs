//! Attempt bookkeeping for provider failover

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::{BackoffConfig, EngineConfig};
use crate::credential::{CooldownPolicy, Credential, CredentialId};
use crate::error::{ErrorKind, QuillError};

/// Result of one attempt (or skip) against one credential
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
    /// Credential was cooling down; no attempt consumed
    CooldownSkip,
}

/// One entry of the provider path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptRecord {
    pub credential_id: CredentialId,
    /// 1-based attempt number on this credential, 0 for a skip
    pub attempt: u32,
    pub outcome: AttemptOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub elapsed_ms: u64,
}

impl AttemptRecord {
    pub fn skipped(credential_id: CredentialId) -> Self {
        Self {
            credential_id,
            attempt: 0,
            outcome: AttemptOutcome::CooldownSkip,
            error_kind: None,
            elapsed_ms: 0,
        }
    }
}

/// Ordered audit trail of attempts for one session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderPath(Vec<AttemptRecord>);

impl ProviderPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: AttemptRecord) {
        self.0.push(record);
    }

    pub fn records(&self) -> &[AttemptRecord] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Attempts actually made (skips excluded)
    pub fn attempt_count(&self) -> usize {
        self.0
            .iter()
            .filter(|r| r.outcome != AttemptOutcome::CooldownSkip)
            .count()
    }

    /// Distinct credentials that received at least one attempt, in order
    pub fn attempted_credentials(&self) -> Vec<CredentialId> {
        let mut ids: Vec<CredentialId> = Vec::new();
        for record in &self.0 {
            if record.outcome != AttemptOutcome::CooldownSkip && !ids.contains(&record.credential_id)
            {
                ids.push(record.credential_id);
            }
        }
        ids
    }

    pub fn outcomes_for(&self, id: CredentialId) -> Vec<AttemptOutcome> {
        self.0
            .iter()
            .filter(|r| r.credential_id == id)
            .map(|r| r.outcome)
            .collect()
    }
}

/// Tunables for the failover loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrchestratorConfig {
    pub max_fallback_providers: usize,
    pub backoff: BackoffConfig,
    pub cooldown: CooldownPolicy,
}

impl OrchestratorConfig {
    pub fn candidate_cap(&self) -> usize {
        self.max_fallback_providers.saturating_add(1)
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for OrchestratorConfig {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_fallback_providers: config.max_fallback_providers,
            backoff: config.backoff,
            cooldown: config.cooldown_policy(),
        }
    }
}

/// Successful orchestration
#[derive(Debug, Clone)]
pub struct OrchestratorOutcome {
    /// Credential that produced the completion
    pub credential: Credential,
    pub path: ProviderPath,
    /// Full text of the successful attempt
    pub text: String,
}

/// Failed orchestration, with the path walked before giving up
#[derive(Debug, Clone, Error)]
#[error("{error}")]
pub struct ProviderFailure {
    pub error: QuillError,
    pub path: ProviderPath,
}

impl From<ProviderFailure> for QuillError {
    fn from(failure: ProviderFailure) -> Self {
        failure.error
    }
}
