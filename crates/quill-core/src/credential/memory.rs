//! In-memory credential store
//!
//! Each credential lives behind its own mutex, so updates to one id are serialized
//! while different ids never contend.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::debug;

use super::store::CredentialStore;
use super::types::{
    CooldownPolicy, Credential, CredentialHealth, CredentialId, DecryptedCredential, Secret,
};
use crate::error::{QuillError, QuillResult};

#[derive(Debug)]
struct StoredCredential {
    credential: Credential,
    secret: Secret,
}

/// Credential store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    entries: DashMap<CredentialId, Arc<Mutex<StoredCredential>>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Build a store from credentials and their secrets
    pub fn with_credentials(credentials: impl IntoIterator<Item = (Credential, Secret)>) -> Self {
        let store = Self::new();
        for (credential, secret) in credentials {
            store.insert(credential, secret);
        }
        store
    }

    /// Insert or replace a credential
    pub fn insert(&self, credential: Credential, secret: Secret) {
        self.entries.insert(
            credential.id,
            Arc::new(Mutex::new(StoredCredential { credential, secret })),
        );
    }

    /// Current metadata for one credential
    pub fn snapshot(&self, id: CredentialId) -> Option<Credential> {
        self.entry(id).map(|entry| entry.lock().credential.clone())
    }

    pub fn set_enabled(&self, id: CredentialId, enabled: bool) -> bool {
        match self.entry(id) {
            Some(entry) => {
                entry.lock().credential.enabled = enabled;
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    // Clone the Arc out so the DashMap shard lock is released before locking the entry
    fn entry(&self, id: CredentialId) -> Option<Arc<Mutex<StoredCredential>>> {
        self.entries.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    fn require(&self, id: CredentialId) -> QuillResult<Arc<Mutex<StoredCredential>>> {
        self.entry(id)
            .ok_or_else(|| QuillError::store(format!("credential {} does not exist", id)))
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn list_enabled_ordered(&self) -> QuillResult<Vec<Credential>> {
        let handles: Vec<_> = self
            .entries
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        let mut credentials: Vec<Credential> = handles
            .iter()
            .map(|handle| handle.lock().credential.clone())
            .filter(|credential| credential.enabled)
            .collect();
        credentials.sort_by_key(|credential| credential.rank_key());
        Ok(credentials)
    }

    async fn get_decrypted(&self, id: CredentialId) -> QuillResult<Option<DecryptedCredential>> {
        Ok(self.entry(id).map(|entry| {
            let stored = entry.lock();
            DecryptedCredential {
                credential: stored.credential.clone(),
                secret: stored.secret.clone(),
            }
        }))
    }

    async fn mark_success(&self, id: CredentialId) -> QuillResult<()> {
        let entry = self.require(id)?;
        let mut stored = entry.lock();
        stored.credential.failure_count = 0;
        stored.credential.cooldown_until = None;
        debug!(credential_id = %id, "credential marked healthy");
        Ok(())
    }

    async fn mark_failure(
        &self,
        id: CredentialId,
        policy: CooldownPolicy,
    ) -> QuillResult<CredentialHealth> {
        let entry = self.require(id)?;
        let mut stored = entry.lock();
        let failure_count = stored.credential.failure_count.saturating_add(1);
        let cooldown_until = policy.cooldown_until(failure_count, Utc::now());
        stored.credential.failure_count = failure_count;
        stored.credential.cooldown_until = cooldown_until;
        debug!(
            credential_id = %id,
            failure_count,
            cooling_down = cooldown_until.is_some(),
            "credential failure recorded"
        );
        Ok(CredentialHealth {
            failure_count,
            cooldown_until,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn credential(id: u64, priority: i32) -> Credential {
        Credential {
            id: CredentialId(id),
            name: format!("cred-{}", id),
            provider: "openai".to_string(),
            endpoint: "https://api.example.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            priority,
            is_default: false,
            enabled: true,
            max_retries: 2,
            failure_count: 0,
            cooldown_until: None,
        }
    }

    fn policy() -> CooldownPolicy {
        CooldownPolicy {
            threshold: 3,
            cooldown: Duration::from_secs(60),
        }
    }

    #[tokio::test]
    async fn test_list_skips_disabled_and_orders() {
        let store = InMemoryCredentialStore::with_credentials([
            (credential(1, 5), Secret::new("a")),
            (credential(2, 1), Secret::new("b")),
            (credential(3, 0), Secret::new("c")),
        ]);
        store.set_enabled(CredentialId(3), false);

        let ids: Vec<u64> = store
            .list_enabled_ordered()
            .await
            .unwrap()
            .iter()
            .map(|c| c.id.0)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[tokio::test]
    async fn test_failure_threshold_starts_cooldown_and_success_resets() {
        let store = InMemoryCredentialStore::with_credentials([(credential(1, 0), Secret::new("k"))]);
        let id = CredentialId(1);

        assert_eq!(store.mark_failure(id, policy()).await.unwrap().failure_count, 1);
        assert_eq!(store.mark_failure(id, policy()).await.unwrap().cooldown_until, None);
        let health = store.mark_failure(id, policy()).await.unwrap();
        assert_eq!(health.failure_count, 3);
        assert!(health.cooldown_until.is_some());
        assert!(store.snapshot(id).unwrap().in_cooldown());

        store.mark_success(id).await.unwrap();
        let snapshot = store.snapshot(id).unwrap();
        assert_eq!(snapshot.failure_count, 0);
        assert_eq!(snapshot.cooldown_until, None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_failures_are_not_lost() {
        let store = Arc::new(InMemoryCredentialStore::with_credentials([(
            credential(7, 0),
            Secret::new("k"),
        )]));
        let generous = CooldownPolicy {
            threshold: 1_000,
            cooldown: Duration::from_secs(60),
        };

        let mut handles = Vec::new();
        for _ in 0..64 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.mark_failure(CredentialId(7), generous).await.unwrap();
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(store.snapshot(CredentialId(7)).unwrap().failure_count, 64);
    }

    #[tokio::test]
    async fn test_unknown_credential_is_store_error() {
        let store = InMemoryCredentialStore::new();
        assert!(store.mark_success(CredentialId(42)).await.is_err());
        assert!(store.get_decrypted(CredentialId(42)).await.unwrap().is_none());
    }
}
