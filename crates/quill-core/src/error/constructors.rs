//! Constructor methods for QuillError

use super::kinds::ErrorKind;
use super::types::QuillError;

impl QuillError {
    /// Create an invalid request error
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field: None,
        }
    }

    /// Create an invalid request error for a specific field
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            field: Some(field.into()),
        }
    }

    /// Create a session not found error
    pub fn session_not_found(session_id: impl Into<String>) -> Self {
        Self::SessionNotFound {
            session_id: session_id.into(),
        }
    }

    /// Create a provider error of the given kind
    pub fn provider(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
            status_code: None,
            credential_id: None,
        }
    }

    /// Create a provider error carrying the HTTP status
    pub fn provider_status(kind: ErrorKind, status: u16, message: impl Into<String>) -> Self {
        Self::Provider {
            kind,
            message: message.into(),
            status_code: Some(status),
            credential_id: None,
        }
    }

    /// Create a network error
    pub fn network(message: impl Into<String>) -> Self {
        Self::provider(ErrorKind::NetworkError, message)
    }

    /// Create a no usable credential error
    pub fn no_usable_credential(message: impl Into<String>) -> Self {
        Self::NoUsableCredential {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: None,
        }
    }

    /// Create a configuration error with context
    pub fn config_with_context(message: impl Into<String>, context: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
            context: Some(context.into()),
        }
    }

    /// Create a credential store error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an IO error with a path
    pub fn io_with_path(message: impl Into<String>, path: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
            path: Some(path.into()),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Attach the credential id to a provider error
    pub fn with_credential(self, id: impl Into<String>) -> Self {
        match self {
            Self::Provider {
                kind,
                message,
                status_code,
                ..
            } => Self::Provider {
                kind,
                message,
                status_code,
                credential_id: Some(id.into()),
            },
            other => other,
        }
    }
}
