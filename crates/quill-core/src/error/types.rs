//! Core error type for Quill

use thiserror::Error;

use super::kinds::ErrorKind;
use crate::evaluation::ValidationError;

/// Result type alias for Quill operations
pub type QuillResult<T> = Result<T, QuillError>;

/// Main error type for Quill
#[derive(Error, Debug, Clone)]
pub enum QuillError {
    /// Start request rejected before a session was created
    #[error("Invalid request: {message}")]
    InvalidRequest {
        message: String,
        field: Option<String>,
    },

    /// Unknown or already finished session
    #[error("Session not found: {session_id}")]
    SessionNotFound { session_id: String },

    /// Failure reported by one provider call
    #[error("Provider error ({kind}): {message}")]
    Provider {
        kind: ErrorKind,
        message: String,
        status_code: Option<u16>,
        credential_id: Option<String>,
    },

    /// No candidate credential could be attempted
    #[error("No usable credential: {message}")]
    NoUsableCredential { message: String },

    /// Session deadline elapsed
    #[error("Evaluation timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Session was cancelled by the caller
    #[error("Evaluation was cancelled")]
    Cancelled,

    /// Model output failed parsing or schema checks
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Configuration related errors
    #[error("Configuration error: {message}")]
    Config {
        message: String,
        context: Option<String>,
    },

    /// Credential store errors
    #[error("Credential store error: {message}")]
    Store { message: String },

    /// JSON serialization/deserialization errors
    #[error("JSON error: {message}")]
    Json { message: String },

    /// IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        path: Option<String>,
    },

    /// Unexpected failure, including a panicked pipeline task
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl QuillError {
    /// Classified kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidRequest { .. } => ErrorKind::InvalidRequest,
            Self::SessionNotFound { .. } => ErrorKind::SessionNotFound,
            Self::Provider { kind, .. } => *kind,
            Self::NoUsableCredential { .. } => ErrorKind::NoUsableCredential,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled => ErrorKind::Cancelled,
            Self::Validation(_) => ErrorKind::ValidationError,
            Self::Config { .. }
            | Self::Store { .. }
            | Self::Json { .. }
            | Self::Io { .. }
            | Self::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Stable error code for events
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }

    /// Whether the same credential may be tried again
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    /// Whether this error is a cancellation
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Optional detail for the `error` event payload
    pub fn detail(&self) -> Option<serde_json::Value> {
        match self {
            Self::Validation(validation) => Some(serde_json::json!({
                "violations": validation.violations(),
            })),
            Self::Provider {
                status_code,
                credential_id,
                ..
            } => Some(serde_json::json!({
                "status": status_code,
                "credentialId": credential_id,
            })),
            Self::InvalidRequest {
                field: Some(field), ..
            } => Some(serde_json::json!({ "field": field })),
            _ => None,
        }
    }
}
