//! SSE wire frames for OpenAI-compatible chat streaming.
//!
//! Each event is a line prefixed by `data:` carrying either the literal
//! `[DONE]` sentinel or a JSON object with optional usage and a choices
//! array whose entries carry a delta, a finish reason, and an index.

use serde::Deserialize;

use ferrochat_core::{StreamError, Usage};

/// The literal sentinel marking successful end of stream.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE line decoder: raw transport bytes in, `data:` payloads out.
///
/// Handles partial lines across reads, CRLF endings, blank keep-alive
/// lines, and `:` comment lines.
#[derive(Debug, Default)]
pub struct SseLineDecoder {
    buffer: String,
}

impl SseLineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append transport bytes and drain every complete `data:` payload.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.push_str(&String::from_utf8_lossy(bytes));

        let mut payloads = Vec::new();
        while let Some(line_end) = self.buffer.find('\n') {
            let line = self.buffer[..line_end].trim_end_matches('\r').to_string();
            self.buffer = self.buffer[line_end + 1..].to_string();

            // Skip empty lines and SSE comments
            if line.is_empty() || line.starts_with(':') {
                continue;
            }

            if let Some(data) = line.strip_prefix("data:") {
                payloads.push(data.trim().to_string());
            }
        }
        payloads
    }
}

/// One decoded stream event.
#[derive(Debug)]
pub enum SseFrame {
    /// The `[DONE]` sentinel: the stream ended with no further content.
    Done,
    /// A partial response chunk.
    Chunk(ChunkFrame),
}

impl SseFrame {
    /// Decode one `data:` payload.
    pub fn parse(payload: &str) -> Result<Self, StreamError> {
        if payload == DONE_SENTINEL {
            return Ok(Self::Done);
        }
        serde_json::from_str::<ChunkFrame>(payload)
            .map(Self::Chunk)
            .map_err(|e| StreamError::MalformedFrame(format!("{e}: {payload}")))
    }
}

/// A partial response chunk: `data: {...}`.
#[derive(Debug, Deserialize)]
pub struct ChunkFrame {
    #[serde(default)]
    pub choices: Vec<ChoiceDelta>,
    #[serde(default)]
    pub usage: Option<UsageFrame>,
    #[serde(default)]
    pub model: Option<String>,
}

/// One entry of the chunk's choices array.
#[derive(Debug, Deserialize)]
pub struct ChoiceDelta {
    #[serde(default)]
    pub index: u32,
    #[serde(default)]
    pub delta: MessageDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// An incremental message fragment.
#[derive(Debug, Default, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub reasoning_content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// A tool call fragment — arrives incrementally across chunks, keyed by
/// a stable position index. The first fragment at an index carries the
/// call id and function name; later fragments contribute argument
/// substrings.
#[derive(Debug, Deserialize)]
pub struct ToolCallDelta {
    pub index: u32,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Usage counters as they appear on the wire.
#[derive(Debug, Deserialize)]
pub struct UsageFrame {
    #[serde(default)]
    pub prompt_tokens: u32,
    #[serde(default)]
    pub completion_tokens: u32,
    #[serde(default)]
    pub total_tokens: u32,
}

impl UsageFrame {
    pub fn to_usage(&self) -> Usage {
        Usage::new(self.prompt_tokens, self.completion_tokens, self.total_tokens)
    }
}
