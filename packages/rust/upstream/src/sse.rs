//! Decoding of OpenAI-style `text/event-stream` bodies.
//!
//! Each `data:` line carries one JSON chunk whose
//! `choices[0].delta.content` is the next fragment; `data: [DONE]` ends the
//! stream. Other fields (`event:`, `id:`, comments) are ignored.

use serde_json::Value;

use manualchat_shared::{ManualChatError, Result};

/// One decoded SSE line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    Fragment(String),
    Done,
    Skip,
}

/// Decode a single line (without its terminator).
pub(crate) fn parse_line(line: &str) -> Result<SseEvent> {
    let line = line.trim_end_matches('\r');

    let Some(data) = line.strip_prefix("data:") else {
        return Ok(SseEvent::Skip);
    };
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == "[DONE]" {
        return Ok(SseEvent::Done);
    }
    if data.trim().is_empty() {
        return Ok(SseEvent::Skip);
    }

    let chunk: Value = serde_json::from_str(data)
        .map_err(|e| ManualChatError::Upstream(format!("malformed stream chunk: {e}")))?;

    if let Some(err) = chunk.get("error") {
        let message = err
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string());
        return Err(ManualChatError::Upstream(message));
    }

    match chunk
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
    {
        Some(content) if !content.is_empty() => Ok(SseEvent::Fragment(content.to_string())),
        _ => Ok(SseEvent::Skip),
    }
}

/// Reassembles lines from arbitrarily split body chunks.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    /// Append bytes and return every line completed by them.
    pub(crate) fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buf.drain(..=pos).collect();
            lines.push(String::from_utf8_lossy(&line[..line.len() - 1]).into_owned());
        }
        lines
    }

    /// The trailing unterminated line, if any.
    pub(crate) fn finish(self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(String::from_utf8_lossy(&self.buf).into_owned())
        }
    }
}
