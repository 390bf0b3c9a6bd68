//! The ferrochat chat client.
//!
//! Ties the pieces together:
//!
//! 1. **Receive** a request (messages + options + tool callbacks)
//! 2. **Run the stage chain** — each stage may rewrite the request on the
//!    way down and the response on the way back out
//! 3. **Invoke the model** through the tool-calling loop: requested tools
//!    are executed, results appended, and the model re-invoked until it
//!    answers with text or the round bound is reached
//! 4. **Return** the final response, or the incremental event stream
//!
//! Usage from every model round is summed into the response the caller
//! sees.

pub mod client;
pub mod registry;
pub mod tool_loop;

pub use client::{ChatClient, ChatClientConfig};
pub use registry::ToolRegistry;
pub use tool_loop::{ToolCallLoop, DEFAULT_MAX_ROUNDS};
