//! Evaluation sessions: registry, pipeline and per-session event bus

mod builder;
mod bus;
pub mod events;
mod pipeline;
mod registry;
pub mod types;

pub use builder::SessionRegistryBuilder;
pub use bus::{EventStream, Subscription};
pub use events::{CompletionSummary, ErrorReport, EvaluationEvent, EventPayload, ProgressStep};
pub use registry::SessionRegistry;
pub use types::{EvaluationRequest, SessionId, SessionInfo, SessionStatus, TaskType};
