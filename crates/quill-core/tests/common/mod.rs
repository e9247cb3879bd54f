//! Shared fixtures for session integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use futures::StreamExt;
use parking_lot::Mutex;
use quill_core::credential::{Credential, CredentialId, DecryptedCredential, Secret};
use quill_core::error::{QuillError, QuillResult};
use quill_core::llm::transport::status_error;
use quill_core::llm::{CompletionRequest, DeltaSink, ProviderTransport};
use quill_core::{EvaluationEvent, EventStream, InMemoryCredentialStore};
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// One scripted provider response
#[derive(Debug, Clone)]
pub enum Reply {
    /// Stream these deltas, then end normally
    Deltas(Vec<String>),
    /// Fail with this HTTP status
    Status(u16),
    /// Wait this long before the first byte, honouring cancellation
    Delayed(Duration, Vec<String>),
    /// Never answer until cancelled
    Hang,
}

/// Transport that replays a script per credential and records every call
#[derive(Default)]
pub struct ScriptedTransport {
    scripts: Mutex<HashMap<CredentialId, VecDeque<Reply>>>,
    calls: Mutex<Vec<(CredentialId, f32)>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, id: u64, replies: Vec<Reply>) -> Self {
        self.scripts.lock().insert(CredentialId(id), replies.into());
        self
    }

    pub fn calls(&self) -> Vec<u64> {
        self.calls.lock().iter().map(|(id, _)| id.0).collect()
    }

    pub fn temperatures(&self) -> Vec<f32> {
        self.calls.lock().iter().map(|(_, t)| *t).collect()
    }
}

#[async_trait]
impl ProviderTransport for ScriptedTransport {
    async fn stream_completion(
        &self,
        credential: &DecryptedCredential,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &mut DeltaSink<'_>,
    ) -> QuillResult<()> {
        let id = credential.credential.id;
        self.calls.lock().push((id, request.temperature));
        let reply = self
            .scripts
            .lock()
            .get_mut(&id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Reply::Status(500));

        match reply {
            Reply::Deltas(deltas) => {
                for delta in &deltas {
                    on_delta(delta);
                }
                Ok(())
            }
            Reply::Status(code) => Err(status_error(code, r#"{"error":{"message":"scripted"}}"#)),
            Reply::Delayed(delay, deltas) => {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(QuillError::Cancelled),
                    _ = tokio::time::sleep(delay) => {}
                }
                for delta in &deltas {
                    on_delta(delta);
                }
                Ok(())
            }
            Reply::Hang => {
                cancel.cancelled().await;
                Err(QuillError::Cancelled)
            }
        }
    }
}

pub fn credential(id: u64, priority: i32, max_retries: u32) -> (Credential, Secret) {
    (
        Credential {
            id: CredentialId(id),
            name: format!("cred-{}", id),
            provider: "openai".to_string(),
            endpoint: "https://llm.example.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            priority,
            is_default: false,
            enabled: true,
            max_retries,
            failure_count: 0,
            cooldown_until: None,
        },
        Secret::new(format!("sk-test-{}", id)),
    )
}

pub fn store(credentials: Vec<(Credential, Secret)>) -> Arc<InMemoryCredentialStore> {
    Arc::new(InMemoryCredentialStore::with_credentials(credentials))
}

/// A well-formed model response with two annotated sentences
pub fn valid_output() -> String {
    json!({
        "total_score": 6.5,
        "task_achievement": 6.0,
        "coherence_cohesion": 7.0,
        "lexical_resource": 6.5,
        "grammatical_range": 6.0,
        "sentences": [
            {
                "index": 0,
                "original": "The chart show the sales.",
                "errors": [{
                    "type": "grammar",
                    "original": "show",
                    "correction": "shows",
                    "range": {"start": 10, "end": 14, "unit": "utf16"}
                }]
            },
            {"index": 1, "original": "Sales rose steadily."}
        ],
        "overall_feedback": "A clear overview."
    })
    .to_string()
}

/// Split text into `parts` roughly equal deltas
pub fn chunked(text: &str, parts: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    let size = chars.len().div_ceil(parts).max(1);
    chars.chunks(size).map(|c| c.iter().collect()).collect()
}

pub async fn collect(stream: EventStream) -> Vec<EvaluationEvent> {
    stream.collect().await
}

/// Event types, with progress events shown as `progress:<step>`
pub fn labels(events: &[EvaluationEvent]) -> Vec<String> {
    events
        .iter()
        .map(|event| {
            let value = serde_json::to_value(event).unwrap_or_default();
            match value["type"].as_str() {
                Some("progress") => format!(
                    "progress:{}",
                    value["data"]["step"].as_str().unwrap_or_default()
                ),
                Some(kind) => kind.to_string(),
                None => String::new(),
            }
        })
        .collect()
}
