//! The ChatClient facade.
//!
//! Wires the stage chain, the tool-calling loop, and the model together
//! behind two entry points: `call` for single-shot and `stream` for
//! incremental responses. Built once from an immutable configuration
//! struct; per-request settings layer on top at call time.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::info;

use ferrochat_core::{
    ChatModel, ChatOptions, ChatRequest, ChatResponse, Result, Stage, StreamEvent, ToolCallback,
};
use ferrochat_pipeline::StageChain;

use crate::registry::ToolRegistry;
use crate::tool_loop::{ToolCallLoop, DEFAULT_MAX_ROUNDS};

/// Everything a client needs, resolved up front.
///
/// Endpoint, credentials, and transport options live inside the `model`
/// implementation — they are injected already configured, never loaded
/// here.
pub struct ChatClientConfig {
    /// The model endpoint seam.
    pub model: Arc<dyn ChatModel>,

    /// Interception stages, in insertion order (the chain stable-sorts
    /// them by `order()`).
    pub stages: Vec<Arc<dyn Stage>>,

    /// Client-level tool callbacks, available to every request.
    pub tools: Vec<Arc<dyn ToolCallback>>,

    /// Defaults merged under each request's options.
    pub default_options: ChatOptions,

    /// Bound on model invocations per logical call.
    pub max_tool_rounds: u32,
}

impl ChatClientConfig {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self {
            model,
            stages: Vec::new(),
            tools: Vec::new(),
            default_options: ChatOptions::default(),
            max_tool_rounds: DEFAULT_MAX_ROUNDS,
        }
    }
}

/// The client-side orchestration entry point.
pub struct ChatClient {
    chain: StageChain,
    tools: Vec<Arc<dyn ToolCallback>>,
    default_options: ChatOptions,
}

impl std::fmt::Debug for ChatClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatClient")
            .field("tools", &self.tools.len())
            .field("default_options", &self.default_options)
            .finish()
    }
}

impl ChatClient {
    /// Build a client from resolved configuration.
    ///
    /// Duplicate names among the client-level tools fail here, before
    /// any request is processed.
    pub fn new(config: ChatClientConfig) -> Result<Self> {
        ToolRegistry::new(&config.tools)?;

        let tool_loop = Arc::new(
            ToolCallLoop::new(config.model).with_max_rounds(config.max_tool_rounds),
        );
        let chain = StageChain::new(config.stages)
            .with_call_terminal(tool_loop.clone())
            .with_stream_terminal(tool_loop);

        info!(
            stages = chain.stage_names().len(),
            tools = config.tools.len(),
            "chat client ready"
        );

        Ok(Self {
            chain,
            tools: config.tools,
            default_options: config.default_options,
        })
    }

    /// Single-shot call: returns the final response, or the first fatal
    /// error.
    pub async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
        let request = self.prepare(request)?;
        self.chain.call(request).await
    }

    /// Streamed call: returns the incremental event sequence ending in
    /// a `Completed` or `Failed` event.
    pub async fn stream(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        let request = self.prepare(request)?;
        self.chain.stream(request).await
    }

    /// Validate the request and layer client defaults under it.
    fn prepare(&self, mut request: ChatRequest) -> Result<ChatRequest> {
        request.validate()?;
        request.options = request.options.merge(&self.default_options);

        // client tools first, request tools after; a name collision
        // anywhere in the merged set is a configuration error
        let mut callbacks = self.tools.clone();
        callbacks.extend(request.tool_callbacks);
        ToolRegistry::new(&callbacks)?;
        request.tool_callbacks = callbacks;

        Ok(request)
    }
}
