//! Text-generation backend access: messages, SSE decoding, transport, failover

pub mod messages;
pub mod orchestrator;
pub mod sse_decoder;
pub mod transport;

pub use messages::{ChatMessage, CompletionRequest, MessageRole};
pub use orchestrator::{
    AttemptOutcome, AttemptRecord, OrchestratorConfig, OrchestratorOutcome, ProviderFailure,
    ProviderOrchestrator, ProviderPath,
};
pub use sse_decoder::{SseDecoder, SseFrame};
pub use transport::{DeltaSink, HttpTransport, ProviderTransport, SharedTransport};
