//! Parsing and schema checks for accumulated model output

use serde_json::{Map, Value};

use super::types::{ValidationError, Violation};
use crate::evaluation::result::{EvaluationResult, SCORE_FIELDS, SCORE_MAX, SCORE_MIN};

/// Remove a surrounding Markdown code fence, if any
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (`json`, `JSON`, ...) up to the first newline
    let body = match rest.find('\n') {
        Some(newline) => &rest[newline + 1..],
        None => rest.trim_start_matches(|c: char| c.is_ascii_alphabetic()),
    };
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

/// Parse and validate a complete model response.
///
/// Every violation is collected before returning. The raw text travels with the
/// error so callers can persist it.
pub fn validate_response(raw: &str) -> Result<EvaluationResult, ValidationError> {
    let value: Value = match serde_json::from_str(strip_code_fence(raw)) {
        Ok(value) => value,
        Err(e) => {
            let mut error = ValidationError::new().with_raw(raw);
            error.push(Violation::new(
                "$",
                "parse",
                format!("response is not valid JSON: {}", e),
            ));
            return Err(error);
        }
    };

    let mut error = ValidationError::new();
    match value.as_object() {
        Some(root) => check_root(root, &mut error),
        None => error.push(Violation::new("$", "type", "response must be a JSON object")),
    }
    if error.has_errors() {
        return Err(error.with_raw(raw));
    }

    serde_json::from_value(value).map_err(|e| {
        let mut error = ValidationError::new().with_raw(raw);
        error.push(Violation::new("$", "type", e.to_string()));
        error
    })
}

fn check_root(root: &Map<String, Value>, error: &mut ValidationError) {
    for field in SCORE_FIELDS {
        check_score(field, root.get(field), error);
    }

    match root.get("sentences") {
        None | Some(Value::Null) => {
            error.push(Violation::new("sentences", "required", "field is required"));
        }
        Some(Value::Array(sentences)) => {
            for (i, sentence) in sentences.iter().enumerate() {
                check_sentence(&format!("sentences[{}]", i), sentence, error);
            }
        }
        Some(_) => error.push(Violation::new("sentences", "type", "must be an array")),
    }

    match root.get("overall_feedback") {
        None | Some(Value::Null) | Some(Value::String(_)) => {}
        Some(_) => error.push(Violation::new("overall_feedback", "type", "must be a string")),
    }
}

fn check_score(field: &str, value: Option<&Value>, error: &mut ValidationError) {
    match value {
        None | Some(Value::Null) => {
            error.push(Violation::new(field, "required", "field is required"));
        }
        Some(value) => match value.as_f64() {
            None => error.push(Violation::new(field, "type", "must be a number")),
            Some(score) if !(SCORE_MIN..=SCORE_MAX).contains(&score) => {
                error.push(Violation::new(
                    field,
                    "range",
                    format!("score {} is outside [{}, {}]", score, SCORE_MIN, SCORE_MAX),
                ));
            }
            Some(_) => {}
        },
    }
}

fn check_sentence(path: &str, sentence: &Value, error: &mut ValidationError) {
    let Some(sentence) = sentence.as_object() else {
        error.push(Violation::new(path, "type", "must be an object"));
        return;
    };

    if !is_u32(sentence.get("index")) {
        error.push(Violation::new(
            format!("{}.index", path),
            "type",
            "must be a non-negative integer",
        ));
    }
    if !sentence.get("original").is_some_and(Value::is_string) {
        error.push(Violation::new(
            format!("{}.original", path),
            "type",
            "must be a string",
        ));
    }

    match sentence.get("errors") {
        None | Some(Value::Null) => {}
        Some(Value::Array(issues)) => {
            for (j, issue) in issues.iter().enumerate() {
                check_issue(&format!("{}.errors[{}]", path, j), issue, error);
            }
        }
        Some(_) => error.push(Violation::new(
            format!("{}.errors", path),
            "type",
            "must be an array",
        )),
    }
}

fn check_issue(path: &str, issue: &Value, error: &mut ValidationError) {
    let Some(issue) = issue.as_object() else {
        error.push(Violation::new(path, "type", "must be an object"));
        return;
    };
    let range_path = format!("{}.range", path);
    let Some(range) = issue.get("range").and_then(Value::as_object) else {
        error.push(Violation::new(range_path, "required", "range object is required"));
        return;
    };

    if let Some(unit) = range.get("unit") {
        if unit.as_str() != Some("utf16") {
            error.push(Violation::new(
                format!("{}.unit", range_path),
                "unit",
                "unit must be 'utf16'",
            ));
        }
    }

    let start = range.get("start");
    let end = range.get("end");
    if !is_u32(start) || !is_u32(end) {
        error.push(Violation::new(
            range_path,
            "type",
            "start and end must be non-negative integers",
        ));
        return;
    }
    let (start, end) = (
        start.and_then(Value::as_u64).unwrap_or_default(),
        end.and_then(Value::as_u64).unwrap_or_default(),
    );
    if start > end {
        error.push(Violation::new(
            range_path,
            "order",
            format!("start {} is greater than end {}", start, end),
        ));
    }
}

fn is_u32(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_u64)
        .is_some_and(|n| u32::try_from(n).is_ok())
}
