//! Quill Core Library
//!
//! Streaming essay evaluation sessions. A [`SessionRegistry`] runs each submission
//! through a ranked pool of OpenAI-compatible credentials with per-credential retry,
//! cooldown and failover, validates the model's structured output, and publishes
//! ordered lifecycle events to subscribers.

pub mod config;
pub mod credential;
pub mod error;
pub mod evaluation;
pub mod interrupt;
pub mod llm;
pub mod session;

// Re-export commonly used types
pub use config::{ConfigLoader, EngineConfig, LoggingConfig};
pub use credential::{
    Credential, CredentialId, CredentialStore, InMemoryCredentialStore, SharedCredentialStore,
};
pub use error::{ErrorKind, QuillError, QuillResult};
pub use evaluation::{
    CollectingSink, EvaluationResult, NoopSink, PromptSource, ResultSink, StaticPromptSource,
};
pub use interrupt::{InterruptReason, SessionInterrupt};
pub use llm::{HttpTransport, ProviderOrchestrator, ProviderTransport};
pub use session::{
    EvaluationEvent, EvaluationRequest, EventPayload, EventStream, SessionId, SessionRegistry,
    SessionStatus, Subscription, TaskType,
};
