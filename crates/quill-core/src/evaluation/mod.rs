//! Evaluation results: model, prompts, validation, persistence

pub mod prompt;
pub mod result;
pub mod sink;
pub mod validator;

pub use prompt::{PromptSource, PromptTemplate, SharedPromptSource, StaticPromptSource};
pub use result::{
    EvaluationResult, FlaggedIssue, RangeUnit, SCORE_FIELDS, SentenceAnnotation, SubScores,
    Utf16Range,
};
pub use sink::{
    CollectingSink, EvaluationRecord, NoopSink, RejectedEvaluation, ResultSink, SharedResultSink,
    SubmissionMeta,
};
pub use validator::{ValidationError, Violation, strip_code_fence, validate_response};
