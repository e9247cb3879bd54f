//! From trait implementations for QuillError conversions

use super::classifiers::{classify_status, classify_without_status};
use super::kinds::ErrorKind;
use super::types::QuillError;

impl From<anyhow::Error> for QuillError {
    fn from(error: anyhow::Error) -> Self {
        Self::internal(error.to_string())
    }
}

impl From<std::io::Error> for QuillError {
    fn from(error: std::io::Error) -> Self {
        Self::Io {
            message: error.to_string(),
            path: None,
        }
    }
}

impl From<serde_json::Error> for QuillError {
    fn from(error: serde_json::Error) -> Self {
        Self::Json {
            message: error.to_string(),
        }
    }
}

impl From<reqwest::Error> for QuillError {
    fn from(error: reqwest::Error) -> Self {
        match error.status() {
            Some(status) => Self::provider_status(
                classify_status(status.as_u16()),
                status.as_u16(),
                error.to_string(),
            ),
            // The request never left: bad endpoint URL or header value
            None if error.is_builder() => Self::provider(ErrorKind::ApiError, error.to_string()),
            None if error.is_connect() || error.is_timeout() => {
                Self::provider(ErrorKind::NetworkError, error.to_string())
            }
            None => {
                let message = error.to_string();
                Self::provider(classify_without_status(&message), message)
            }
        }
    }
}
