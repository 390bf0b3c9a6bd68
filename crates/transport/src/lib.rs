//! Transport adapters for ferrochat.
//!
//! Implementations of `ferrochat_core::ChatModel` over real wire
//! protocols. The orchestration core consumes the trait only; endpoint,
//! credentials, and HTTP client come in here, already resolved.

pub mod openai;

pub use openai::OpenAiCompatModel;
