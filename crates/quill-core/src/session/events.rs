//! Events delivered to session subscribers
//!
//! Every event serializes as `{"sessionId": ..., "type": ..., "data": ...}`.

use serde::{Deserialize, Serialize};

use super::types::SessionId;
use crate::credential::CredentialId;
use crate::error::QuillError;
use crate::evaluation::{SentenceAnnotation, SubScores};
use crate::llm::ProviderPath;

/// Pipeline step reported by `progress` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStep {
    Starting,
    CallingLlm,
    Streaming,
    Parsing,
    SendingResults,
}

impl ProgressStep {
    pub fn percent(&self) -> u8 {
        match self {
            Self::Starting => 0,
            Self::CallingLlm => 10,
            Self::Streaming => 50,
            Self::Parsing => 80,
            Self::SendingResults => 90,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            Self::Starting => "Preparing evaluation",
            Self::CallingLlm => "Contacting model",
            Self::Streaming => "Receiving response",
            Self::Parsing => "Checking response",
            Self::SendingResults => "Delivering results",
        }
    }
}

/// Payload of a `complete` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSummary {
    pub credential_id: CredentialId,
    pub provider_path: ProviderPath,
    pub duration_ms: u64,
}

/// Payload of an `error` event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl From<&QuillError> for ErrorReport {
    fn from(error: &QuillError) -> Self {
        Self {
            code: error.code().to_string(),
            message: error.to_string(),
            detail: error.detail(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum EventPayload {
    Progress {
        step: ProgressStep,
        percent: u8,
        message: String,
    },
    Score(SubScores),
    Sentence(SentenceAnnotation),
    Feedback(String),
    Complete(CompletionSummary),
    Error(ErrorReport),
}

impl EventPayload {
    pub fn progress(step: ProgressStep) -> Self {
        Self::Progress {
            step,
            percent: step.percent(),
            message: step.message().to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Progress { .. } => "progress",
            Self::Score(_) => "score",
            Self::Sentence(_) => "sentence",
            Self::Feedback(_) => "feedback",
            Self::Complete(_) => "complete",
            Self::Error(_) => "error",
        }
    }

    /// `complete` and `error` close the stream
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete(_) | Self::Error(_))
    }
}

/// One event of one session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluationEvent {
    pub session_id: SessionId,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl EvaluationEvent {
    pub fn new(session_id: SessionId, payload: EventPayload) -> Self {
        Self {
            session_id,
            payload,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.payload.is_terminal()
    }
}
