//! Persistence sink seam
//!
//! The engine never stores results itself. It hands accepted results, and the raw
//! text of rejected ones, to a [`ResultSink`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

use super::result::EvaluationResult;
use super::validator::Violation;
use crate::credential::CredentialId;
use crate::error::QuillResult;
use crate::llm::ProviderPath;
use crate::session::{SessionId, TaskType};

/// Submission metadata shared by both record kinds
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubmissionMeta {
    pub session_id: SessionId,
    pub task_type: TaskType,
    pub topic_id: Option<String>,
    pub content: String,
    pub word_count: u32,
    pub submitted_at: DateTime<Utc>,
}

/// Accepted evaluation plus how it was produced
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRecord {
    pub submission: SubmissionMeta,
    pub credential_id: CredentialId,
    pub model: String,
    pub result: EvaluationResult,
    pub provider_path: ProviderPath,
    pub duration_ms: u64,
}

/// Model output that failed validation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedEvaluation {
    pub submission: SubmissionMeta,
    pub credential_id: CredentialId,
    pub raw: String,
    pub violations: Vec<Violation>,
}

/// Receives final results
#[async_trait]
pub trait ResultSink: Send + Sync {
    async fn persist(&self, record: &EvaluationRecord) -> QuillResult<()>;

    /// Keep the raw text of a rejected response for diagnostics
    async fn persist_failure(&self, rejected: &RejectedEvaluation) -> QuillResult<()>;
}

pub type SharedResultSink = Arc<dyn ResultSink>;

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

#[async_trait]
impl ResultSink for NoopSink {
    async fn persist(&self, _record: &EvaluationRecord) -> QuillResult<()> {
        Ok(())
    }

    async fn persist_failure(&self, _rejected: &RejectedEvaluation) -> QuillResult<()> {
        Ok(())
    }
}

/// Keeps everything in memory
#[derive(Debug, Default)]
pub struct CollectingSink {
    records: Mutex<Vec<EvaluationRecord>>,
    rejected: Mutex<Vec<RejectedEvaluation>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<EvaluationRecord> {
        self.records.lock().clone()
    }

    pub fn rejected(&self) -> Vec<RejectedEvaluation> {
        self.rejected.lock().clone()
    }
}

#[async_trait]
impl ResultSink for CollectingSink {
    async fn persist(&self, record: &EvaluationRecord) -> QuillResult<()> {
        self.records.lock().push(record.clone());
        Ok(())
    }

    async fn persist_failure(&self, rejected: &RejectedEvaluation) -> QuillResult<()> {
        self.rejected.lock().push(rejected.clone());
        Ok(())
    }
}
