//! Validation failure types

use serde::Serialize;

/// One schema violation, addressed by JSON path
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Location such as `sentences[2].errors[0].range`
    pub path: String,
    /// Short machine code: required, type, range, unit, order, parse
    pub code: &'static str,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

/// Aggregated failure of one model response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationError {
    violations: Vec<Violation>,
    /// Raw model text, kept when it could not be accepted
    raw: Option<String>,
}

impl ValidationError {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, violation: Violation) {
        self.violations.push(violation);
    }

    pub fn with_raw(mut self, raw: impl Into<String>) -> Self {
        self.raw = Some(raw.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        !self.violations.is_empty()
    }

    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    pub fn raw(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Whether the text never parsed as JSON
    pub fn is_parse_failure(&self) -> bool {
        self.violations.iter().any(|v| v.code == "parse")
    }

    /// Paths of every violation, in discovery order
    pub fn paths(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.path.as_str()).collect()
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .violations
            .iter()
            .map(|v| format!("{}: {}", v.path, v.message))
            .collect();
        write!(f, "Evaluation result failed validation: {}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}
