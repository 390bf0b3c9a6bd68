//! Built-in logging stage.
//!
//! Traces the request on the way down and the response on the way back
//! out. Placed first by default (lowest order) so it observes what every
//! other stage did.

use async_trait::async_trait;
use tracing::debug;

use ferrochat_core::{ChatRequest, ChatResponse, Result, Stage};

/// A stage that logs request and response summaries via `tracing`.
pub struct LogStage {
    order: i32,
}

impl LogStage {
    pub fn new() -> Self {
        Self { order: i32::MIN }
    }

    /// Place the stage at a specific chain position.
    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }
}

impl Default for LogStage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Stage for LogStage {
    fn name(&self) -> &str {
        "log"
    }

    fn order(&self) -> i32 {
        self.order
    }

    async fn before(&self, request: ChatRequest) -> Result<ChatRequest> {
        debug!(
            model = %request.options.model,
            messages = request.messages.len(),
            tools = request.tool_callbacks.len(),
            "chat request"
        );
        Ok(request)
    }

    async fn after(&self, response: ChatResponse) -> Result<ChatResponse> {
        debug!(
            generations = response.generations.len(),
            prompt_tokens = response.usage.prompt_tokens,
            completion_tokens = response.usage.completion_tokens,
            "chat response"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn log_stage_is_pass_through() {
        let stage = LogStage::new();
        assert_eq!(stage.name(), "log");
        assert_eq!(stage.order(), i32::MIN);

        let req = ChatRequest::default().with_context("marker", serde_json::json!(true));
        let out = stage.before(req).await.unwrap();
        assert_eq!(out.context["marker"], serde_json::json!(true));

        let resp = stage.after(ChatResponse::empty()).await.unwrap();
        assert!(resp.generations.is_empty());
    }
}
