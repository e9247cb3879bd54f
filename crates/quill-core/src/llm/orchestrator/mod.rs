//! Provider orchestration: ranked candidates, per-credential retry, failover
//!
//! For each candidate the orchestrator makes up to `max_retries + 1` attempts.
//! Retryable failures wait out the backoff and try the same credential again; a
//! non-retryable failure or exhausted retries records a persistent failure on the
//! credential and moves on. Cancellation ends the loop without touching credential
//! health.

mod types;

pub use types::{
    AttemptOutcome, AttemptRecord, OrchestratorConfig, OrchestratorOutcome, ProviderFailure,
    ProviderPath,
};

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::CompletionRequest;
use super::transport::{DeltaSink, SharedTransport};
use crate::credential::{Credential, CredentialId, DecryptedCredential, SharedCredentialStore};
use crate::error::{QuillError, QuillResult};
use crate::interrupt::sleep_cancellable;

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Drives one completion across the ranked credential pool
#[derive(Clone)]
pub struct ProviderOrchestrator {
    store: SharedCredentialStore,
    transport: SharedTransport,
    config: OrchestratorConfig,
}

impl std::fmt::Debug for ProviderOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderOrchestrator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ProviderOrchestrator {
    pub fn new(
        store: SharedCredentialStore,
        transport: SharedTransport,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            store,
            transport,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Candidate list for one session, already ranked and capped
    pub async fn resolve_candidates(
        &self,
        pinned: Option<CredentialId>,
    ) -> QuillResult<Vec<Credential>> {
        let mut candidates = match pinned {
            Some(id) => match self.store.get_decrypted(id).await? {
                Some(found) if found.credential.enabled => vec![found.credential],
                Some(_) => {
                    return Err(QuillError::no_usable_credential(format!(
                        "credential {} is disabled",
                        id
                    )));
                }
                None => {
                    return Err(QuillError::no_usable_credential(format!(
                        "credential {} does not exist",
                        id
                    )));
                }
            },
            None => {
                let mut enabled = self.store.list_enabled_ordered().await?;
                enabled.retain(|c| c.enabled);
                enabled.sort_by_key(|c| c.rank_key());
                enabled
            }
        };

        if candidates.is_empty() {
            return Err(QuillError::no_usable_credential(
                "no enabled credentials are configured",
            ));
        }
        candidates.truncate(self.config.candidate_cap());
        Ok(candidates)
    }

    /// Run one completion with failover.
    ///
    /// Every delta of every attempt is forwarded to `on_delta`; the returned text is
    /// that of the successful attempt only.
    #[instrument(skip(self, request, cancel, on_delta))]
    pub async fn execute(
        &self,
        pinned: Option<CredentialId>,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &mut DeltaSink<'_>,
    ) -> Result<OrchestratorOutcome, ProviderFailure> {
        let mut path = ProviderPath::new();
        let candidates = match self.resolve_candidates(pinned).await {
            Ok(candidates) => candidates,
            Err(error) => return Err(ProviderFailure { error, path }),
        };
        debug!(count = candidates.len(), "resolved candidates");

        let mut last_error: Option<QuillError> = None;
        let mut cooling: Vec<CredentialId> = Vec::new();

        for candidate in candidates {
            if cancel.is_cancelled() {
                return Err(ProviderFailure {
                    error: QuillError::Cancelled,
                    path,
                });
            }

            // Another session may have started a cooldown since listing
            let decrypted = match self.store.get_decrypted(candidate.id).await {
                Ok(Some(decrypted)) => decrypted,
                Ok(None) => {
                    warn!(credential_id = %candidate.id, "credential vanished before attempt");
                    continue;
                }
                Err(error) => {
                    warn!(credential_id = %candidate.id, error = %error, "failed to load credential");
                    last_error = Some(error);
                    continue;
                }
            };

            if decrypted.credential.in_cooldown() {
                info!(credential_id = %candidate.id, "credential cooling down, skipping");
                path.push(AttemptRecord::skipped(candidate.id));
                cooling.push(candidate.id);
                continue;
            }

            match self
                .attempt_credential(&decrypted, request, cancel, on_delta, &mut path)
                .await
            {
                Ok(text) => {
                    if let Err(error) = self.store.mark_success(candidate.id).await {
                        warn!(credential_id = %candidate.id, error = %error, "failed to record credential success");
                    }
                    info!(
                        credential_id = %candidate.id,
                        attempts = path.attempt_count(),
                        "completion succeeded"
                    );
                    return Ok(OrchestratorOutcome {
                        credential: decrypted.credential,
                        path,
                        text,
                    });
                }
                Err(error) if error.is_cancelled() => {
                    return Err(ProviderFailure { error, path });
                }
                Err(error) => {
                    self.record_failure(candidate.id).await;
                    warn!(
                        credential_id = %candidate.id,
                        kind = %error.kind(),
                        "credential failed, falling over"
                    );
                    last_error = Some(error.with_credential(candidate.id.to_string()));
                }
            }
        }

        let error = last_error.unwrap_or_else(|| {
            if cooling.is_empty() {
                return QuillError::no_usable_credential("no candidate credential could be attempted");
            }
            let ids: Vec<String> = cooling.iter().map(ToString::to_string).collect();
            QuillError::no_usable_credential(format!(
                "all candidate credentials are cooling down: [{}]",
                ids.join(", ")
            ))
        });
        Err(ProviderFailure { error, path })
    }

    /// Up to `max_retries + 1` attempts on one credential
    #[instrument(
        skip_all,
        fields(credential_id = %credential.credential.id, max_retries = credential.credential.max_retries)
    )]
    async fn attempt_credential(
        &self,
        credential: &DecryptedCredential,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &mut DeltaSink<'_>,
        path: &mut ProviderPath,
    ) -> QuillResult<String> {
        let id = credential.credential.id;
        let max_attempts = credential.credential.max_retries.saturating_add(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let started = Instant::now();
            let mut text = String::new();
            let result = {
                let mut forward = |delta: &str| {
                    text.push_str(delta);
                    on_delta(delta);
                };
                self.transport
                    .stream_completion(credential, request, cancel, &mut forward)
                    .await
            };
            let elapsed_ms = millis(started.elapsed());

            let error = match result {
                Ok(()) => {
                    debug!(attempt, elapsed_ms, "attempt succeeded");
                    path.push(AttemptRecord {
                        credential_id: id,
                        attempt,
                        outcome: AttemptOutcome::Success,
                        error_kind: None,
                        elapsed_ms,
                    });
                    return Ok(text);
                }
                Err(error) if error.is_cancelled() => return Err(error),
                Err(error) => error,
            };

            let retryable = error.is_retryable();
            path.push(AttemptRecord {
                credential_id: id,
                attempt,
                outcome: if retryable {
                    AttemptOutcome::RetryableFailure
                } else {
                    AttemptOutcome::FatalFailure
                },
                error_kind: Some(error.kind()),
                elapsed_ms,
            });

            if !retryable || attempt >= max_attempts {
                warn!(attempt, elapsed_ms, kind = %error.kind(), error = %error, "giving up on credential");
                return Err(error);
            }

            let delay = self.config.backoff.delay_after(attempt);
            warn!(
                attempt,
                elapsed_ms,
                kind = %error.kind(),
                delay_ms = millis(delay),
                "attempt failed, retrying"
            );
            sleep_cancellable(cancel, delay).await?;
        }
    }

    async fn record_failure(&self, id: CredentialId) {
        match self.store.mark_failure(id, self.config.cooldown).await {
            Ok(health) if health.cooldown_until.is_some() => {
                warn!(
                    credential_id = %id,
                    failure_count = health.failure_count,
                    "credential entered cooldown"
                );
            }
            Ok(health) => {
                debug!(credential_id = %id, failure_count = health.failure_count, "credential failure recorded");
            }
            Err(error) => {
                warn!(credential_id = %id, error = %error, "failed to record credential failure");
            }
        }
    }
}
