//! ChatModel trait — the abstraction over the model endpoint.
//!
//! A ChatModel knows how to send a normalized request to an LLM endpoint
//! and get an answer back, either as a complete response or as a stream
//! of events. Transport configuration (pooling, TLS, timeouts) belongs to
//! the implementation; the core only consumes this trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::request::ChatRequest;
use crate::response::ChatResponse;

/// An incremental event from a streamed model call.
///
/// The single event-consumer contract: both the incrementally observable
/// text/reasoning stream and the final reconstructed response arrive
/// through this one enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Partial answer text.
    Content { delta: String },

    /// Partial "thinking" text, always distinct from answer content.
    Reasoning { delta: String },

    /// The stream finished; carries the fully reconstructed response,
    /// including defragmented tool calls and accumulated usage.
    Completed { response: Box<ChatResponse> },

    /// The stream failed; no further events follow.
    Failed { message: String },
}

/// The model-invoker seam.
///
/// The stage chain's terminal stages call this trait without knowing
/// which endpoint implementation is behind it.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// A human-readable name for this model backend.
    fn name(&self) -> &str;

    /// Send a request and get a complete response.
    async fn call(&self, request: ChatRequest) -> std::result::Result<ChatResponse, ModelError>;

    /// Send a request and get a stream of events.
    ///
    /// Default implementation calls `call()` and replays the result as a
    /// single `Content` + `Completed` pair.
    async fn stream(
        &self,
        request: ChatRequest,
    ) -> std::result::Result<tokio::sync::mpsc::Receiver<StreamEvent>, ModelError> {
        let response = self.call(request).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(2);
        let text = response.text();
        if !text.is_empty() {
            let _ = tx.send(StreamEvent::Content { delta: text }).await;
        }
        let _ = tx
            .send(StreamEvent::Completed {
                response: Box::new(response),
            })
            .await;
        Ok(rx)
    }
}
