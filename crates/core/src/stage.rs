//! Stage contract — one link in the request/response interception chain.
//!
//! Stages wrap the terminal model invocation: `before` may rewrite the
//! request on the way down, `after` may rewrite the response on the way
//! back out. RAG, conversation memory, and logging collaborators all plug
//! in through this trait; the core never knows them by name.

use async_trait::async_trait;

use crate::error::Result;
use crate::request::ChatRequest;
use crate::response::ChatResponse;

/// The kind of call flowing through the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    /// Single-shot request/response.
    Call,
    /// Incrementally streamed response.
    Stream,
}

/// One interception stage.
///
/// Execution is single-threaded per invocation: for a given request,
/// `before` hooks run in chain order and `after` hooks in strict reverse
/// order, never concurrently with each other.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stage name, for chain diagnostics.
    fn name(&self) -> &str;

    /// Advisory priority. The chain stable-sorts by this key; insertion
    /// order breaks ties. Lower runs earlier on the downward pass.
    fn order(&self) -> i32 {
        0
    }

    /// Whether this stage participates in the given call kind. A stage
    /// that does not recognize a kind is skipped, not an error.
    fn supports(&self, kind: CallKind) -> bool {
        let _ = kind;
        true
    }

    /// Rewrite the request on the way down. Default: pass-through.
    async fn before(&self, request: ChatRequest) -> Result<ChatRequest> {
        Ok(request)
    }

    /// Rewrite the response on the way back out. Default: pass-through.
    async fn after(&self, response: ChatResponse) -> Result<ChatResponse> {
        Ok(response)
    }
}
