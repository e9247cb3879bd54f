//! Error types for Quill
//!
//! Every failure the engine can produce is a [`QuillError`]. Each error maps to an
//! [`ErrorKind`], whose stable snake_case code is what subscribers see in `error`
//! events and what the orchestrator uses to decide between retry, failover and
//! termination.

mod classifiers;
mod constructors;
mod conversions;
mod kinds;
mod types;

pub use classifiers::{classify_message, classify_status, classify_without_status};
pub use kinds::ErrorKind;
pub use types::{QuillError, QuillResult};
