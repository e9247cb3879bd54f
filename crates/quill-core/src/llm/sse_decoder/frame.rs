//! Decoded SSE frames

/// One dispatched Server-Sent Events frame
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SseFrame {
    /// `event:` field, if the server sent one
    pub event: Option<String>,
    /// `data:` lines joined with `\n`
    pub data: String,
}

impl SseFrame {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            event: None,
            data: data.into(),
        }
    }

    /// OpenAI-style end-of-stream sentinel
    pub fn is_done(&self) -> bool {
        self.data.trim() == "[DONE]"
    }
}
