//! OpenAI-compatible streaming transport over reqwest

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use super::chunk::{FrameContent, parse_frame};
use super::error_body::status_error;
use super::{DeltaSink, ProviderTransport};
use crate::credential::DecryptedCredential;
use crate::error::{QuillError, QuillResult};
use crate::interrupt::run_cancellable;
use crate::llm::messages::{ChatMessage, CompletionRequest};
use crate::llm::sse_decoder::{SseDecoder, SseFrame};

/// Attribution headers OpenRouter asks clients to send
pub const OPENROUTER_REFERER: &str = "https://github.com/quill-eval/quill";
pub const OPENROUTER_TITLE: &str = "Quill Writing Evaluator";

#[derive(Debug, Serialize)]
struct ChatCompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
    stream: bool,
}

/// Transport for any `/chat/completions` endpoint that streams SSE
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http_client: Client,
}

impl HttpTransport {
    pub fn new(connect_timeout: Duration) -> QuillResult<Self> {
        let http_client = Client::builder()
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|e| QuillError::config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { http_client })
    }

    /// Use an existing client
    pub fn with_client(http_client: Client) -> Self {
        Self { http_client }
    }

    fn request(
        &self,
        credential: &DecryptedCredential,
        request: &CompletionRequest,
    ) -> reqwest::RequestBuilder {
        let meta = &credential.credential;
        let url = format!("{}/chat/completions", meta.endpoint.trim_end_matches('/'));
        let body = ChatCompletionBody {
            model: &meta.model,
            messages: &request.messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream: true,
        };

        let mut builder = self
            .http_client
            .post(url)
            .bearer_auth(credential.secret.expose())
            .header("Accept", "text/event-stream")
            .json(&body);
        if meta.provider.eq_ignore_ascii_case("openrouter") {
            builder = builder
                .header("HTTP-Referer", OPENROUTER_REFERER)
                .header("X-Title", OPENROUTER_TITLE);
        }
        builder
    }
}

/// Feed one frame to the sink. Returns true on the terminal sentinel.
fn forward_frame(frame: &SseFrame, on_delta: &mut DeltaSink<'_>) -> bool {
    match parse_frame(frame) {
        FrameContent::Delta(text) => on_delta(&text),
        FrameContent::Done => return true,
        FrameContent::Empty => {}
        FrameContent::Malformed => {
            warn!(frame = %frame.data.chars().take(200).collect::<String>(), "skipping malformed stream chunk");
        }
    }
    false
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    #[instrument(
        skip(self, credential, request, cancel, on_delta),
        fields(credential_id = %credential.credential.id, model = %credential.credential.model)
    )]
    async fn stream_completion(
        &self,
        credential: &DecryptedCredential,
        request: &CompletionRequest,
        cancel: &CancellationToken,
        on_delta: &mut DeltaSink<'_>,
    ) -> QuillResult<()> {
        let builder = self.request(credential, request);
        let response =
            run_cancellable(cancel, async move { builder.send().await.map_err(QuillError::from) })
                .await?;

        let status = response.status();
        if !status.is_success() {
            let body = run_cancellable(cancel, async move {
                Ok(response.text().await.unwrap_or_default())
            })
            .await?;
            return Err(status_error(status.as_u16(), &body));
        }

        let mut bytes = response.bytes_stream();
        let mut decoder = SseDecoder::new();
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(QuillError::Cancelled),
                next = bytes.next() => next,
            };
            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => {
                    return Err(QuillError::network(format!("Stream read failed: {}", e)));
                }
                None => break,
            };
            for frame in decoder.feed(&chunk) {
                if forward_frame(&frame, on_delta) {
                    debug!("stream finished with sentinel");
                    return Ok(());
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            forward_frame(&frame, on_delta);
        }
        debug!("stream closed by server");
        Ok(())
    }
}
