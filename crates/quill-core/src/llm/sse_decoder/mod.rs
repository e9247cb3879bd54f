//! Server-Sent Events decoder for streaming completions
//!
//! Works on raw bytes and only decodes complete lines. A newline byte never occurs
//! inside a multi-byte UTF-8 sequence, so characters split across network chunks
//! are reassembled without extra bookkeeping.

mod frame;

pub use frame::SseFrame;

/// Incremental SSE decoder
///
/// ```text
/// event: optional_type
/// data: {"choices": [...]}
/// : keepalive comment
///
/// data: [DONE]
/// ```
///
/// A blank line dispatches the pending frame. Comment lines (leading `:`) and
/// unknown fields are ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes after the last newline seen
    pending: Vec<u8>,
    event: Option<String>,
    data_lines: Vec<String>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one network chunk and return every frame it completed
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        self.pending.extend_from_slice(chunk);

        let mut frames = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = self.pending[consumed..].iter().position(|b| *b == b'\n') {
            let end = consumed + offset;
            let line = String::from_utf8_lossy(&self.pending[consumed..end]).into_owned();
            consumed = end + 1;
            if let Some(frame) = self.process_line(&line) {
                frames.push(frame);
            }
        }
        self.pending.drain(..consumed);
        frames
    }

    /// Flush at end of stream. A trailing frame without its blank line is still
    /// dispatched.
    pub fn finish(&mut self) -> Option<SseFrame> {
        if !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            if let Some(frame) = self.process_line(&line) {
                return Some(frame);
            }
        }
        self.dispatch()
    }

    /// Whether a partial line or frame is buffered
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty() || !self.data_lines.is_empty()
    }

    fn process_line(&mut self, line: &str) -> Option<SseFrame> {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field.trim(), value.strip_prefix(' ').unwrap_or(value)),
            None => (line.trim(), ""),
        };
        match field {
            "data" => self.data_lines.push(value.to_string()),
            "event" => self.event = Some(value.trim().to_string()),
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = self.event.take();
        if self.data_lines.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data_lines).join("\n");
        Some(SseFrame { event, data })
    }
}

#[cfg(test)]
mod tests;
