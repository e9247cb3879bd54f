//! Credential store seam

use async_trait::async_trait;
use std::sync::Arc;

use super::types::{CooldownPolicy, Credential, CredentialHealth, CredentialId, DecryptedCredential};
use crate::error::QuillResult;

/// Source of ranked credentials and sink for their health.
///
/// Implementations must apply `mark_success`/`mark_failure` for one id atomically:
/// concurrent sessions report against the same credential.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Enabled credentials, default first, then priority and id ascending
    async fn list_enabled_ordered(&self) -> QuillResult<Vec<Credential>>;

    /// Current metadata plus decrypted secret
    async fn get_decrypted(&self, id: CredentialId) -> QuillResult<Option<DecryptedCredential>>;

    /// Reset failure count and clear any cooldown
    async fn mark_success(&self, id: CredentialId) -> QuillResult<()>;

    /// Increment the failure count and start a cooldown once the policy threshold
    /// is reached, as one atomic update
    async fn mark_failure(
        &self,
        id: CredentialId,
        policy: CooldownPolicy,
    ) -> QuillResult<CredentialHealth>;
}

/// Shared handle to a credential store
pub type SharedCredentialStore = Arc<dyn CredentialStore>;
