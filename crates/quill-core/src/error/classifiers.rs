//! Error classification for provider failures
//!
//! Status codes are authoritative. Message text is only consulted when a failure
//! carries no status at all.

use super::kinds::ErrorKind;

/// Map a non-2xx HTTP status to an error kind
pub fn classify_status(status: u16) -> ErrorKind {
    match status {
        401 => ErrorKind::InvalidCredential,
        404 => ErrorKind::ModelNotFound,
        429 => ErrorKind::RateLimited,
        500..=599 => ErrorKind::ServerError,
        _ => ErrorKind::ApiError,
    }
}

/// Last-resort classification from free text
pub fn classify_message(message: &str) -> Option<ErrorKind> {
    let message_lower = message.to_lowercase();

    if message_lower.contains("unauthorized") || message_lower.contains("invalid api key") {
        Some(ErrorKind::InvalidCredential)
    } else if message_lower.contains("rate limit") || message_lower.contains("too many requests")
    {
        Some(ErrorKind::RateLimited)
    } else if message_lower.contains("model not found")
        || message_lower.contains("does not exist")
    {
        Some(ErrorKind::ModelNotFound)
    } else if message_lower.contains("overloaded")
        || message_lower.contains("server error")
        || message_lower.contains("bad gateway")
    {
        Some(ErrorKind::ServerError)
    } else if message_lower.contains("connection")
        || message_lower.contains("network")
        || message_lower.contains("timed out")
    {
        Some(ErrorKind::NetworkError)
    } else {
        None
    }
}

/// Kind for a failure that carries no status. Anything unrecognised is treated
/// as a connection problem.
pub fn classify_without_status(message: &str) -> ErrorKind {
    classify_message(message).unwrap_or(ErrorKind::NetworkError)
}
