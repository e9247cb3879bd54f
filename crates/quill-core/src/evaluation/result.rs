//! Structured evaluation result

use serde::{Deserialize, Serialize};

/// Lowest and highest band score
pub const SCORE_MIN: f64 = 0.0;
pub const SCORE_MAX: f64 = 9.0;

/// Names of the five required sub-scores, in emission order
pub const SCORE_FIELDS: [&str; 5] = [
    "total_score",
    "task_achievement",
    "coherence_cohesion",
    "lexical_resource",
    "grammatical_range",
];

/// The five band scores, each within [0, 9]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SubScores {
    pub total_score: f64,
    pub task_achievement: f64,
    pub coherence_cohesion: f64,
    pub lexical_resource: f64,
    pub grammatical_range: f64,
}

/// Unit of a range offset. Only UTF-16 code units are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RangeUnit {
    #[default]
    #[serde(rename = "utf16")]
    Utf16,
}

/// Span inside a sentence, counted in UTF-16 code units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Utf16Range {
    pub start: u32,
    pub end: u32,
    #[serde(default)]
    pub unit: RangeUnit,
}

impl Utf16Range {
    pub fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            unit: RangeUnit::Utf16,
        }
    }

    /// Text covered by this range, if it falls on valid boundaries of `text`
    pub fn slice(&self, text: &str) -> Option<String> {
        let units: Vec<u16> = text.encode_utf16().collect();
        let (start, end) = (self.start as usize, self.end as usize);
        if start > end || end > units.len() {
            return None;
        }
        String::from_utf16(&units[start..end]).ok()
    }
}

/// One issue flagged inside a sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedIssue {
    /// Category such as grammar, vocabulary, spelling
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correction: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    pub range: Utf16Range,
}

/// Annotation for one sentence of the submitted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SentenceAnnotation {
    pub index: u32,
    pub original: String,
    #[serde(default)]
    pub errors: Vec<FlaggedIssue>,
}

/// Accepted model output
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    #[serde(flatten)]
    pub scores: SubScores,
    pub sentences: Vec<SentenceAnnotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_feedback: Option<String>,
}
