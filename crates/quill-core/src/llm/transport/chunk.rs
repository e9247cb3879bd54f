//! OpenAI-compatible stream chunk parsing

use serde::Deserialize;

use crate::llm::sse_decoder::SseFrame;

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

/// What one SSE frame contributes to the completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameContent {
    /// Text to forward
    Delta(String),
    /// Terminal sentinel
    Done,
    /// Keepalive, role-only or empty delta
    Empty,
    /// Not parseable as a chunk
    Malformed,
}

/// Extract `choices[0].delta.content` from one frame
pub fn parse_frame(frame: &SseFrame) -> FrameContent {
    if frame.is_done() {
        return FrameContent::Done;
    }
    let data = frame.data.trim();
    if data.is_empty() {
        return FrameContent::Empty;
    }

    match serde_json::from_str::<StreamChunk>(data) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map_or(FrameContent::Empty, FrameContent::Delta),
        Err(_) => FrameContent::Malformed,
    }
}
