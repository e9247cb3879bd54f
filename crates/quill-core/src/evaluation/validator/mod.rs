//! Response validation
//!
//! Turns the accumulated completion text into an [`EvaluationResult`], tolerating a
//! fenced code wrapper and reporting every schema violation at once.
//!
//! [`EvaluationResult`]: crate::evaluation::EvaluationResult

mod core;
mod types;

pub use core::{strip_code_fence, validate_response};
pub use types::{ValidationError, Violation};
