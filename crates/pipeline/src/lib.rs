//! Stage chain for ferrochat.
//!
//! An ordered pipeline of interception stages wrapping a terminal model
//! invocation. Collaborators (RAG, conversation memory, logging) implement
//! `ferrochat_core::Stage` and are composed here; the chain guarantees
//! `before` hooks fire in list order and `after` hooks in strict reverse
//! order, exactly once each per request.

pub mod chain;
pub mod logging;
pub mod terminal;

pub use chain::{CallTerminal, StageChain, StreamTerminal};
pub use logging::LogStage;
pub use terminal::{ModelCallStage, ModelStreamStage};
