//! The tool-calling loop.
//!
//! Wraps the "invoke model" step of the stage chain: if the model's
//! answer requests tool calls, the loop executes them, appends the
//! results to the conversation, and re-invokes the model, bounded by a
//! maximum round count. This is the one canonical loop — both the
//! single-shot and the streaming paths share its bookkeeping.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use ferrochat_core::{
    ChatModel, ChatRequest, ChatResponse, Error, ExecutionContext, Message, Result, StreamEvent,
    ToolCall, ToolError, Usage,
};
use ferrochat_pipeline::{CallTerminal, StreamTerminal};

use crate::registry::ToolRegistry;

/// Default bound on model invocations per logical call.
pub const DEFAULT_MAX_ROUNDS: u32 = 8;

/// Executes the model ↔ tool conversation until the model stops
/// requesting tools or the round bound is hit.
///
/// Serves as the chain's terminal stage for both call kinds.
pub struct ToolCallLoop {
    model: Arc<dyn ChatModel>,
    max_rounds: u32,
}

impl ToolCallLoop {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            max_rounds: DEFAULT_MAX_ROUNDS,
        }
    }

    /// Bound the number of model invocations per logical call.
    pub fn with_max_rounds(mut self, max_rounds: u32) -> Self {
        self.max_rounds = max_rounds.max(1);
        self
    }

    /// Run the loop for a single-shot call.
    ///
    /// Token usage from every round is summed into the returned
    /// response. Round exhaustion is not an error: the last response is
    /// returned as-is, and a caller that cares can inspect
    /// `finish_reason == ToolCalls`.
    pub async fn run(&self, request: ChatRequest) -> Result<ChatResponse> {
        let registry = ToolRegistry::new(&request.tool_callbacks)?;
        let mut messages = request.messages.clone();
        let mut total_usage = Usage::default();
        let mut round = 0;

        loop {
            round += 1;
            debug!(round, max_rounds = self.max_rounds, "tool loop round");

            let mut round_request = request.clone().with_messages(messages.clone());
            round_request.tools = registry.definitions();

            let mut response = self.model.call(round_request).await.map_err(Error::from)?;
            total_usage.add(&response.usage);

            let calls = response.tool_calls().to_vec();
            if calls.is_empty() || round >= self.max_rounds {
                if !calls.is_empty() {
                    warn!(round, "max tool rounds reached, returning last response as-is");
                }
                response.usage = total_usage;
                return Ok(response);
            }

            // the assistant message carrying the requested calls joins the
            // conversation, then one tool result per call
            if let Some(generation) = response.first() {
                messages.push(generation.message.clone());
            }
            let results = execute_calls(&registry, &calls, &request.context).await?;
            messages.extend(results);
        }
    }

    /// Run the loop over streaming rounds.
    ///
    /// Content and reasoning increments of every round are forwarded to
    /// the returned receiver; intermediate tool-call completions are
    /// consumed by the loop, and only the final round's completion is
    /// surfaced, carrying the summed usage.
    pub async fn run_stream(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        let registry = ToolRegistry::new(&request.tool_callbacks)?;
        let (tx, rx) = mpsc::channel(32);
        let model = self.model.clone();
        let max_rounds = self.max_rounds;

        tokio::spawn(async move {
            let mut messages = request.messages.clone();
            let mut total_usage = Usage::default();
            let mut round = 0;

            loop {
                round += 1;
                debug!(round, max_rounds, "streaming tool loop round");

                let mut round_request = request.clone().with_messages(messages.clone());
                round_request.tools = registry.definitions();

                let mut upstream = match model.stream(round_request).await {
                    Ok(upstream) => upstream,
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Failed {
                                message: e.to_string(),
                            })
                            .await;
                        return;
                    }
                };

                let mut completed: Option<ChatResponse> = None;
                while let Some(event) = upstream.recv().await {
                    match event {
                        StreamEvent::Completed { response } => {
                            completed = Some(*response);
                            break;
                        }
                        StreamEvent::Failed { message } => {
                            let _ = tx.send(StreamEvent::Failed { message }).await;
                            return;
                        }
                        increment => {
                            if tx.send(increment).await.is_err() {
                                return; // receiver dropped
                            }
                        }
                    }
                }

                let Some(mut response) = completed else {
                    let _ = tx
                        .send(StreamEvent::Failed {
                            message: "stream ended without completion".into(),
                        })
                        .await;
                    return;
                };
                total_usage.add(&response.usage);

                let calls = response.tool_calls().to_vec();
                if calls.is_empty() || round >= max_rounds {
                    if !calls.is_empty() {
                        warn!(round, "max tool rounds reached, returning last response as-is");
                    }
                    response.usage = total_usage;
                    let _ = tx
                        .send(StreamEvent::Completed {
                            response: Box::new(response),
                        })
                        .await;
                    return;
                }

                if let Some(generation) = response.first() {
                    messages.push(generation.message.clone());
                }
                match execute_calls(&registry, &calls, &request.context).await {
                    Ok(results) => messages.extend(results),
                    Err(e) => {
                        let _ = tx
                            .send(StreamEvent::Failed {
                                message: Error::from(e).to_string(),
                            })
                            .await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Execute one round's requested calls, in request order.
///
/// An unknown tool name is a protocol violation and fails the whole
/// round. A callback-thrown error is recovered locally: it becomes a
/// tool-result message carrying a diagnostic string so the model can
/// react in the next round, and the remaining calls still run.
async fn execute_calls(
    registry: &ToolRegistry,
    calls: &[ToolCall],
    context: &ExecutionContext,
) -> std::result::Result<Vec<Message>, ToolError> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let callback = registry
            .get(&call.name)
            .ok_or_else(|| ToolError::NotFound(call.name.clone()))?;

        let started = Instant::now();
        match callback.call(&call.arguments, context).await {
            Ok(output) => {
                debug!(
                    tool = %call.name,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "tool executed"
                );
                results.push(Message::tool_result(&call.id, output));
            }
            Err(e) => {
                warn!(tool = %call.name, error = %e, "tool execution failed");
                results.push(Message::tool_result(&call.id, format!("Error: {e}")));
            }
        }
    }
    Ok(results)
}

#[async_trait]
impl CallTerminal for ToolCallLoop {
    fn name(&self) -> &str {
        "tool_loop"
    }

    async fn invoke(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.run(request).await
    }
}

#[async_trait]
impl StreamTerminal for ToolCallLoop {
    fn name(&self) -> &str {
        "tool_loop"
    }

    async fn invoke(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        self.run_stream(request).await
    }
}
