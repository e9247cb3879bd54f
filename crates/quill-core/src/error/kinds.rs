//! Structured error kinds

use serde::{Deserialize, Serialize};

/// Classified kind of a failure.
///
/// Provider kinds come from the transport (HTTP status first, message text only as
/// a fallback). Pipeline kinds terminate the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// 401 from the provider
    InvalidCredential,
    /// 404 from the provider
    ModelNotFound,
    /// 429 from the provider
    RateLimited,
    /// Connection failure or broken stream
    NetworkError,
    /// 5xx from the provider
    ServerError,
    /// Any other non-2xx status
    ApiError,
    /// Session deadline exceeded
    Timeout,
    /// Model output failed parsing or schema checks
    ValidationError,
    /// Explicit cancel
    Cancelled,
    /// No candidate could be attempted
    NoUsableCredential,
    /// Malformed start request
    InvalidRequest,
    /// Unknown or finished session id
    SessionNotFound,
    /// Anything else
    Internal,
}

impl ErrorKind {
    /// Stable code used in `error` events
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidCredential => "invalid_credential",
            Self::ModelNotFound => "model_not_found",
            Self::RateLimited => "rate_limited",
            Self::NetworkError => "network_error",
            Self::ServerError => "server_error",
            Self::ApiError => "api_error",
            Self::Timeout => "timeout",
            Self::ValidationError => "validation_error",
            Self::Cancelled => "cancelled",
            Self::NoUsableCredential => "no_usable_credential",
            Self::InvalidRequest => "invalid_request",
            Self::SessionNotFound => "session_not_found",
            Self::Internal => "internal",
        }
    }

    /// Whether the same credential may be tried again
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::NetworkError | Self::ServerError
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}
