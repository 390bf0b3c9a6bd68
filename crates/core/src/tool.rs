//! Tool callback contract — the seam between the model and caller code.
//!
//! A `ToolCallback` binds one `ToolDefinition` (what the model sees) to an
//! invocable capability (what runs when the model calls it). Callbacks are
//! registered explicitly on the request or the client; there is no global
//! registry and no runtime scanning.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ToolError;

/// A tool definition sent to the model so it can decide whether and how
/// to call the tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// The tool name — the unique key within a request.
    pub name: String,

    /// Description of what the tool does.
    pub description: String,

    /// JSON Schema describing the tool's parameters.
    pub parameters: serde_json::Value,
}

/// Cross-cutting data handed to a callback at invocation time — the
/// request's `context` map, as populated by the caller and by stages.
pub type ExecutionContext = HashMap<String, serde_json::Value>;

/// The tool callback trait.
///
/// Implementations receive the model's raw argument JSON string and return
/// a result string that is fed back to the model as a tool message.
#[async_trait]
pub trait ToolCallback: Send + Sync {
    /// The definition exposed to the model.
    fn definition(&self) -> ToolDefinition;

    /// Invoke the capability.
    async fn call(
        &self,
        arguments: &str,
        context: &ExecutionContext,
    ) -> std::result::Result<String, ToolError>;
}
