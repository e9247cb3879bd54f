//! Vendor error bodies: message extraction and secret redaction

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{QuillError, classify_status};

const MAX_BODY_CHARS: usize = 1_024;

static BEARER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._\-+/=]{8,}").expect("valid bearer regex")
});

static SECRET_PAIR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)\b(api[_-]?key|token|secret|password|authorization)\b(["']?\s*[:=]\s*["']?)[^"',\s}]+"#)
        .expect("valid secret pair regex")
});

static KEY_LITERAL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\bsk-[A-Za-z0-9_\-]{8,}").expect("valid api key regex"));

/// Human-readable message from an error body, redacted and truncated.
///
/// Prefers `error.message`, then `message`, then the raw text.
pub fn error_body_message(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "Unknown error".to_string();
    }

    let extracted = serde_json::from_str::<Value>(trimmed).ok().and_then(|json| {
        json.pointer("/error/message")
            .or_else(|| json.get("message"))
            .or_else(|| json.get("error").filter(|e| e.is_string()))
            .and_then(Value::as_str)
            .map(str::to_string)
    });

    truncate(redact(extracted.as_deref().unwrap_or(trimmed)))
}

/// Redact bearer tokens, `key=value` secrets and raw API keys
pub fn redact(input: &str) -> String {
    let step = BEARER_RE.replace_all(input, "Bearer [REDACTED]");
    let step = SECRET_PAIR_RE.replace_all(&step, "$1$2[REDACTED]");
    KEY_LITERAL_RE.replace_all(&step, "[REDACTED]").into_owned()
}

fn truncate(input: String) -> String {
    let total = input.chars().count();
    if total <= MAX_BODY_CHARS {
        return input;
    }
    let kept: String = input.chars().take(MAX_BODY_CHARS).collect();
    format!("{}... [truncated {} chars]", kept, total - MAX_BODY_CHARS)
}

/// Provider error for a non-2xx response
pub fn status_error(status: u16, body: &str) -> QuillError {
    let kind = classify_status(status);
    let label = match status {
        401 => "Unauthorized",
        404 => "Not found",
        429 => "Rate limited",
        500..=599 => "Server error",
        _ => "API error",
    };
    QuillError::provider_status(
        kind,
        status,
        format!("{} ({}): {}", label, status, error_body_message(body)),
    )
}
