//! The pipeline-internal request unit.
//!
//! A `ChatRequest` bundles the conversation, model options, the tool
//! callbacks active for this call, and a context map stages use to pass
//! cross-cutting data (retrieved documents, memory snippets) downstream.
//! Requests are immutable once handed to a stage — stages rewrite by
//! producing a new value, never by mutating in place.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::message::{Message, Role};
use crate::tool::{ExecutionContext, ToolCallback, ToolDefinition};

/// Model parameters for a request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatOptions {
    /// The model to use (e.g. "gpt-4o", "qwen2.5-coder")
    pub model: String,

    /// Temperature (0.0 = deterministic, higher = more creative)
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Maximum tokens to generate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    /// Nucleus sampling cutoff
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    /// Stop sequences
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stop: Vec<String>,
}

fn default_temperature() -> f32 {
    0.7
}

impl Default for ChatOptions {
    fn default() -> Self {
        Self {
            model: String::new(),
            temperature: default_temperature(),
            max_tokens: None,
            top_p: None,
            stop: Vec::new(),
        }
    }
}

impl ChatOptions {
    /// Layer per-request options over client defaults: unset fields fall
    /// back to `defaults`, set fields win.
    pub fn merge(mut self, defaults: &ChatOptions) -> Self {
        if self.model.is_empty() {
            self.model = defaults.model.clone();
        }
        if self.max_tokens.is_none() {
            self.max_tokens = defaults.max_tokens;
        }
        if self.top_p.is_none() {
            self.top_p = defaults.top_p;
        }
        if self.stop.is_empty() {
            self.stop = defaults.stop.clone();
        }
        self
    }
}

/// The unit of work flowing through the stage chain.
#[derive(Clone, Default)]
pub struct ChatRequest {
    /// Ordered conversation messages.
    pub messages: Vec<Message>,

    /// Model parameters.
    pub options: ChatOptions,

    /// Callbacks the model may invoke during this call.
    pub tool_callbacks: Vec<Arc<dyn ToolCallback>>,

    /// Definitions attached to the outgoing request (populated by the
    /// tool-calling loop from the active registry before each round).
    pub tools: Vec<ToolDefinition>,

    /// Stage scratch space; also handed to tool callbacks at invocation.
    pub context: ExecutionContext,
}

impl ChatRequest {
    /// Create a request from a message list and options.
    pub fn new(messages: Vec<Message>, options: ChatOptions) -> Self {
        Self {
            messages,
            options,
            tool_callbacks: Vec::new(),
            tools: Vec::new(),
            context: HashMap::new(),
        }
    }

    /// Replace the message list, keeping everything else.
    /// Used by the tool-calling loop to extend the conversation per round.
    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages = messages;
        self
    }

    /// Attach a tool callback.
    pub fn with_tool(mut self, callback: Arc<dyn ToolCallback>) -> Self {
        self.tool_callbacks.push(callback);
        self
    }

    /// Set a context entry.
    pub fn with_context(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.context.insert(key.into(), value);
        self
    }

    /// Check the structural invariants of the message list.
    ///
    /// Every tool-result message must reference a `tool_call_id` that
    /// appeared in a *preceding* assistant message's tool calls.
    pub fn validate(&self) -> Result<()> {
        let mut seen_call_ids: Vec<&str> = Vec::new();
        for msg in &self.messages {
            match msg.role {
                Role::Assistant => {
                    seen_call_ids.extend(msg.tool_calls.iter().map(|tc| tc.id.as_str()));
                }
                Role::Tool => {
                    let id = msg.tool_call_id.as_deref().ok_or_else(|| Error::Config {
                        message: "tool message is missing a tool_call_id".into(),
                    })?;
                    if !seen_call_ids.contains(&id) {
                        return Err(Error::Config {
                            message: format!(
                                "tool message references unknown tool_call_id '{id}'"
                            ),
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for ChatRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRequest")
            .field("messages", &self.messages.len())
            .field("options", &self.options)
            .field("tool_callbacks", &self.tool_callbacks.len())
            .field("tools", &self.tools.len())
            .field("context_keys", &self.context.keys().collect::<Vec<_>>())
            .finish()
    }
}
