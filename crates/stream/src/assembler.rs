//! The streaming event-assembly state machine.
//!
//! Consumes a sequence of partial frames for one logical answer and
//! produces (a) incrementally observable text/reasoning increments and
//! (b) a fully reconstructed final response, including tool-call
//! argument defragmentation.
//!
//! States: `Idle → Receiving{Answering | Reasoning} → Finalizing → Idle`
//! (reset). Terminal transitions: the `[DONE]` sentinel,
//! `finish_reason=stop`, `finish_reason=tool_calls`, or transport
//! failure (handled one level up, in the session).

use std::collections::BTreeMap;
use std::mem;

use tracing::trace;

use ferrochat_core::{ChatResponse, FinishReason, Generation, Message, ToolCall, Usage};

use crate::frame::{ChunkFrame, SseFrame};

/// Assembler lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssemblerState {
    /// No frame seen since construction or the last reset.
    Idle,
    /// Accumulating answer text.
    Answering,
    /// Accumulating reasoning text.
    Reasoning,
}

/// What applying one frame produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Emission {
    /// Keep-alive or fragment-only frame: nothing observable.
    Skipped,

    /// A partial answer increment. Empty for accounting-only frames.
    Content(String),

    /// A partial reasoning increment.
    Reasoning(String),

    /// Terminal frame: the reconstructed response, plus the trailing
    /// delta text (if any) to surface as one last increment first.
    Completed {
        trailing: Option<String>,
        response: ChatResponse,
    },
}

/// Accumulates fragments of one tool call, keyed by its stream index.
#[derive(Debug, Default)]
struct ToolCallFragments {
    id: String,
    name: String,
    arguments: String,
}

impl ToolCallFragments {
    fn into_tool_call(self) -> ToolCall {
        ToolCall {
            id: self.id,
            name: self.name,
            arguments: self.arguments,
        }
    }
}

/// Reassembles one complete message from a sequence of partial frames.
///
/// Resets itself after finalizing, so the same instance serves every
/// round of a multi-round streaming tool-calling loop.
#[derive(Debug)]
pub struct StreamAssembler {
    state: AssemblerState,
    content: String,
    reasoning: String,
    tool_calls: BTreeMap<u32, ToolCallFragments>,
    usage: Usage,
    usage_seen: bool,
    finish_reason: Option<FinishReason>,
    generation_index: u32,
    model: String,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self {
            state: AssemblerState::Idle,
            content: String::new(),
            reasoning: String::new(),
            tool_calls: BTreeMap::new(),
            usage: Usage::default(),
            usage_seen: false,
            finish_reason: None,
            generation_index: 0,
            model: String::new(),
        }
    }

    pub fn state(&self) -> AssemblerState {
        self.state
    }

    /// Whether any frame data has arrived since the last reset — i.e. a
    /// round is in flight and a transport close should finalize it.
    pub fn in_flight(&self) -> bool {
        self.state != AssemblerState::Idle
            || !self.tool_calls.is_empty()
            || self.usage_seen
            || self.finish_reason.is_some()
    }

    /// Apply one decoded frame and report what it produced.
    pub fn apply(&mut self, frame: SseFrame) -> Emission {
        match frame {
            SseFrame::Done => Emission::Completed {
                trailing: None,
                response: self.finalize(),
            },
            SseFrame::Chunk(chunk) => self.apply_chunk(chunk),
        }
    }

    fn apply_chunk(&mut self, chunk: ChunkFrame) -> Emission {
        let had_usage = chunk.usage.is_some();
        if let Some(usage) = &chunk.usage {
            // usage accumulates additively, never overwrites
            self.usage.add(&usage.to_usage());
            self.usage_seen = true;
        }
        if self.model.is_empty() {
            if let Some(model) = chunk.model {
                self.model = model;
            }
        }

        let Some(choice) = chunk.choices.into_iter().next() else {
            // no generation content: a trailing accounting-only frame
            return if had_usage {
                Emission::Content(String::new())
            } else {
                trace!("dropping contentless frame without usage");
                Emission::Skipped
            };
        };

        self.generation_index = choice.index;
        let delta = choice.delta;

        // merge tool-call fragments before anything terminal
        if let Some(fragments) = &delta.tool_calls {
            for fragment in fragments {
                let acc = self.tool_calls.entry(fragment.index).or_default();
                if let Some(id) = &fragment.id {
                    acc.id = id.clone();
                }
                if let Some(function) = &fragment.function {
                    if let Some(name) = &function.name {
                        acc.name = name.clone();
                    }
                    if let Some(arguments) = &function.arguments {
                        // substrings concatenate, never replace
                        acc.arguments.push_str(arguments);
                    }
                }
            }
        }

        if let Some(reason) = choice.finish_reason.as_deref() {
            self.finish_reason = FinishReason::from_wire(reason);
            match self.finish_reason {
                Some(FinishReason::Stop) => {
                    // append any trailing delta text, surface it as the
                    // final increment, then finalize
                    let trailing = delta.content.filter(|t| !t.is_empty());
                    if let Some(text) = &trailing {
                        self.content.push_str(text);
                    }
                    return Emission::Completed {
                        trailing,
                        response: self.finalize(),
                    };
                }
                Some(FinishReason::ToolCalls) => {
                    // tool calls are complete only now
                    return Emission::Completed {
                        trailing: None,
                        response: self.finalize(),
                    };
                }
                // length/content_filter: record and wait for [DONE]
                _ => {}
            }
        }

        let content = delta.content.unwrap_or_default();
        let reasoning = delta.reasoning_content.unwrap_or_default();
        let has_fragments = delta.tool_calls.is_some();

        if content.is_empty() && reasoning.is_empty() && !has_fragments {
            // pure keep-alive unless accounting data has shown up
            return if had_usage || self.usage_seen {
                Emission::Content(String::new())
            } else {
                trace!("dropping keep-alive frame");
                Emission::Skipped
            };
        }

        if !reasoning.is_empty() {
            self.reasoning.push_str(&reasoning);
            self.state = AssemblerState::Reasoning;
            return Emission::Reasoning(reasoning);
        }

        if !content.is_empty() {
            self.content.push_str(&content);
            self.state = AssemblerState::Answering;
            return Emission::Content(content);
        }

        // fragment-only frame: partial tool calls are never surfaced
        Emission::Skipped
    }

    /// Build the final response and reset for the next round.
    fn finalize(&mut self) -> ChatResponse {
        let content = mem::take(&mut self.content);
        let reasoning = mem::take(&mut self.reasoning);
        let tool_calls: Vec<ToolCall> = mem::take(&mut self.tool_calls)
            .into_values()
            .map(ToolCallFragments::into_tool_call)
            .collect();

        let finish_reason = self.finish_reason.take().or(if tool_calls.is_empty() {
            None
        } else {
            Some(FinishReason::ToolCalls)
        });

        let mut message = if tool_calls.is_empty() {
            Message::assistant(content)
        } else {
            Message::assistant_with_tool_calls(content, tool_calls)
        };
        if !reasoning.is_empty() {
            message.reasoning_content = Some(reasoning);
        }

        let response = ChatResponse {
            generations: vec![Generation {
                index: self.generation_index,
                message,
                finish_reason,
            }],
            usage: mem::take(&mut self.usage),
            model: mem::take(&mut self.model),
            metadata: serde_json::Map::new(),
        };

        self.usage_seen = false;
        self.generation_index = 0;
        self.state = AssemblerState::Idle;
        response
    }
}

impl Default for StreamAssembler {
    fn default() -> Self {
        Self::new()
    }
}
