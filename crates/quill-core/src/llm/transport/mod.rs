//! Provider transport: one streaming call against one credential

mod chunk;
mod error_body;
mod http;

pub use chunk::{FrameContent, parse_frame};
pub use error_body::{error_body_message, redact, status_error};
pub use http::{HttpTransport, OPENROUTER_REFERER, OPENROUTER_TITLE};

use async_trait::async_trait;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::messages::CompletionRequest;
use crate::credential::DecryptedCredential;
use crate::error::QuillResult;

/// Receives each text delta as it arrives
pub type DeltaSink<'a> = dyn FnMut(&str) + Send + 'a;

/// Executes exactly one streaming completion call
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// Stream one completion, handing every non-empty delta to `on_delta`.
    ///
    /// Resolves when the stream ends normally. Returns `Cancelled` as soon as
    /// `cancel` fires, and a classified provider error otherwise.
    async fn stream_completion(
        &self,
        credential: &DecryptedCredential,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &mut DeltaSink<'_>,
    ) -> QuillResult<()>;
}

pub type SharedTransport = Arc<dyn ProviderTransport>;
