//! # ferrochat Core
//!
//! Domain types, traits, and error definitions for the ferrochat LLM
//! orchestration layer. This crate has **zero framework dependencies** —
//! it defines the value model and seams that all other crates implement
//! against.
//!
//! ## Design Philosophy
//!
//! Every subsystem is defined as a trait here: the model endpoint
//! (`ChatModel`), interception stages (`Stage`), and caller-supplied
//! tools (`ToolCallback`). Implementations live in their respective
//! crates. This enables:
//! - Swapping implementations via configuration
//! - Easy testing with mock/stub implementations
//! - Clean dependency graph (all crates depend inward on core)

pub mod error;
pub mod message;
pub mod model;
pub mod request;
pub mod response;
pub mod stage;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ModelError, Result, StreamError, ToolError};
pub use message::{ContentPart, Message, MessageContent, Role, ToolCall};
pub use model::{ChatModel, StreamEvent};
pub use request::{ChatOptions, ChatRequest};
pub use response::{ChatResponse, FinishReason, Generation, Usage};
pub use stage::{CallKind, Stage};
pub use tool::{ExecutionContext, ToolCallback, ToolDefinition};
