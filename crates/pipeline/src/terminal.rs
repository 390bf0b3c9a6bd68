//! Terminal stages — the innermost chain links that invoke the model.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use ferrochat_core::{ChatModel, ChatRequest, ChatResponse, Result, StreamEvent};

use crate::chain::{CallTerminal, StreamTerminal};

/// Terminal stage for single-shot calls.
pub struct ModelCallStage {
    model: Arc<dyn ChatModel>,
}

impl ModelCallStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl CallTerminal for ModelCallStage {
    fn name(&self) -> &str {
        "model_call"
    }

    async fn invoke(&self, request: ChatRequest) -> Result<ChatResponse> {
        debug!(model = %self.model.name(), messages = request.messages.len(), "invoking model");
        Ok(self.model.call(request).await?)
    }
}

/// Terminal stage for streamed calls.
pub struct ModelStreamStage {
    model: Arc<dyn ChatModel>,
}

impl ModelStreamStage {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }
}

#[async_trait]
impl StreamTerminal for ModelStreamStage {
    fn name(&self) -> &str {
        "model_stream"
    }

    async fn invoke(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        debug!(model = %self.model.name(), messages = request.messages.len(), "opening model stream");
        Ok(self.model.stream(request).await?)
    }
}
