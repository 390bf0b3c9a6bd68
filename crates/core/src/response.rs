//! Response value objects: generations, finish reasons, token accounting.

use serde::{Deserialize, Serialize};

use crate::message::{Message, ToolCall};

/// Why the model stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Natural end of the answer.
    Stop,
    /// Token limit reached.
    Length,
    /// The model is requesting tool execution.
    ToolCalls,
    /// Output was suppressed by a content filter.
    ContentFilter,
}

impl FinishReason {
    /// Map the wire string ("stop", "tool_calls", ...) to a reason.
    /// Unknown strings map to None rather than erroring.
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "stop" => Some(Self::Stop),
            "length" => Some(Self::Length),
            "tool_calls" => Some(Self::ToolCalls),
            "content_filter" => Some(Self::ContentFilter),
            _ => None,
        }
    }
}

/// Token usage counters.
///
/// Accumulates **additively** across every model round within one logical
/// tool-calling loop, and across streamed frames — never overwritten.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens,
        }
    }

    /// Add another round's counters onto this one.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }

    pub fn is_zero(&self) -> bool {
        self.prompt_tokens == 0 && self.completion_tokens == 0 && self.total_tokens == 0
    }
}

/// One generated alternative within a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation {
    /// Position within the response's alternatives.
    pub index: u32,

    /// The generated message.
    pub message: Message,

    /// Why generation stopped, if the endpoint reported it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<FinishReason>,
}

/// The uniform response shape for both single-shot and streamed calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ChatResponse {
    /// One or more generations.
    pub generations: Vec<Generation>,

    /// Accumulated token usage.
    #[serde(default)]
    pub usage: Usage,

    /// Which model actually responded (may differ from requested).
    #[serde(default)]
    pub model: String,

    /// Endpoint- or stage-attached metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

impl ChatResponse {
    /// A response with no generations — what a chain built without a
    /// terminal stage produces instead of failing.
    pub fn empty() -> Self {
        Self::default()
    }

    /// The first generation, if any.
    pub fn first(&self) -> Option<&Generation> {
        self.generations.first()
    }

    /// Tool calls requested by the first generation.
    pub fn tool_calls(&self) -> &[ToolCall] {
        self.first()
            .map(|g| g.message.tool_calls.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the first generation requests tool execution.
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls().is_empty()
    }

    /// The first generation's body flattened to text.
    pub fn text(&self) -> String {
        self.first().map(|g| g.message.text()).unwrap_or_default()
    }
}
