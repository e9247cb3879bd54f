//! Session identifiers, status and requests

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::credential::CredentialId;
use crate::error::{QuillError, QuillResult};

/// Opaque session identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SessionId {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|_| QuillError::session_not_found(s))
    }
}

/// Writing task being scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TaskType {
    #[serde(rename = "task1")]
    Task1,
    #[serde(rename = "task2")]
    Task2,
}

impl TaskType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Task1 => "task1",
            Self::Task2 => "task2",
        }
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskType {
    type Err = QuillError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "task1" => Ok(Self::Task1),
            "task2" => Ok(Self::Task2),
            other => Err(QuillError::invalid_field(
                "task_type",
                format!("unknown task type '{}', expected task1 or task2", other),
            )),
        }
    }
}

/// Lifecycle state of a session. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Pending,
    Running,
    Streaming,
    Completed,
    Cancelled,
    Failed,
    TimedOut,
}

impl SessionStatus {
    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Streaming => 2,
            Self::Completed | Self::Cancelled | Self::Failed | Self::TimedOut => 3,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.rank() == 3
    }

    /// Whether moving from `self` to `next` keeps the state machine monotonic
    pub fn can_advance_to(&self, next: SessionStatus) -> bool {
        !self.is_terminal() && next.rank() > self.rank()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input to `start`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    /// `task1` or `task2`
    pub task_type: String,
    #[serde(default)]
    pub topic_id: Option<String>,
    pub content: String,
    pub word_count: u32,
    /// Pin the session to one credential, disabling fallback
    #[serde(default)]
    pub credential_id: Option<CredentialId>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl EvaluationRequest {
    pub fn new(task_type: TaskType, content: impl Into<String>, word_count: u32) -> Self {
        Self {
            task_type: task_type.as_str().to_string(),
            topic_id: None,
            content: content.into(),
            word_count,
            credential_id: None,
            locale: None,
        }
    }

    pub fn with_topic(mut self, topic_id: impl Into<String>) -> Self {
        self.topic_id = Some(topic_id.into());
        self
    }

    pub fn with_credential(mut self, id: CredentialId) -> Self {
        self.credential_id = Some(id);
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Check the request and resolve its task type
    pub fn validate(&self) -> QuillResult<TaskType> {
        let task_type = self.task_type.parse::<TaskType>()?;
        if self.content.trim().is_empty() {
            return Err(QuillError::invalid_field("content", "content must not be empty"));
        }
        if self.word_count == 0 {
            return Err(QuillError::invalid_field(
                "word_count",
                "word_count must be positive",
            ));
        }
        Ok(task_type)
    }
}

/// Point-in-time view of a live session
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: SessionId,
    pub status: SessionStatus,
    pub created_at: DateTime<Utc>,
    pub task_type: TaskType,
    pub topic_id: Option<String>,
    pub word_count: u32,
    pub credential_id: Option<CredentialId>,
}
