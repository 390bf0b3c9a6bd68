//! Streaming event assembly for ferrochat.
//!
//! A server-sent-event stream delivers partial JSON frames for one
//! logical answer. This crate reconstructs complete messages from them:
//! `frame` decodes the wire, `assembler` is the per-frame state machine
//! (text/reasoning accumulation, tool-call defragmentation, additive
//! usage accounting), `gate` is the caller-facing completion barrier,
//! and `session` wires them together for a live stream.

pub mod assembler;
pub mod frame;
pub mod gate;
pub mod session;

pub use assembler::{AssemblerState, Emission, StreamAssembler};
pub use frame::{ChunkFrame, SseFrame, SseLineDecoder, DONE_SENTINEL};
pub use gate::{CompletionGate, StreamOutcome};
pub use session::StreamSession;
