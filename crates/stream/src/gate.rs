//! Completion gate — the hand-off between the transport's event task and
//! the caller.
//!
//! Events arrive on a transport-owned task while the orchestrating logic
//! (including the tool-calling loop) runs on the caller's task. The gate
//! is the sole synchronization point: it blocks the caller until exactly
//! one terminal signal, latches a signal that arrives before anyone
//! waits, and re-arms itself after each `wait` so one instance serves
//! every round of a multi-round streaming loop.

use std::sync::Mutex;

use tokio::sync::Notify;

use ferrochat_core::{ChatResponse, Error};

/// Terminal outcome of one streamed round.
pub type StreamOutcome = Result<ChatResponse, Error>;

/// A single-use, self-resetting completion barrier.
#[derive(Debug, Default)]
pub struct CompletionGate {
    slot: Mutex<Option<StreamOutcome>>,
    notify: Notify,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Latch a terminal signal and release the waiter.
    ///
    /// The first signal of a round wins; extra signals before the next
    /// `wait` are dropped. Latching means a signal arriving before the
    /// caller starts waiting is never lost.
    pub fn complete(&self, outcome: StreamOutcome) {
        let mut slot = self.slot.lock().unwrap();
        if slot.is_none() {
            *slot = Some(outcome);
            self.notify.notify_one();
        }
    }

    /// Block until the terminal signal, consume it, and re-arm the gate
    /// for the next round.
    pub async fn wait(&self) -> StreamOutcome {
        loop {
            // register interest before checking the slot so a signal
            // landing in between cannot be missed
            let notified = self.notify.notified();
            if let Some(outcome) = self.slot.lock().unwrap().take() {
                return outcome;
            }
            notified.await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn signal_before_wait_is_latched() {
        let gate = CompletionGate::new();
        gate.complete(Ok(ChatResponse::empty()));
        // the waiter arrives after the signal and is released anyway
        assert!(gate.wait().await.is_ok());
    }

    #[tokio::test]
    async fn wait_blocks_until_signal() {
        let gate = Arc::new(CompletionGate::new());
        let signaler = gate.clone();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            signaler.complete(Ok(ChatResponse::empty()));
        });

        assert!(gate.wait().await.is_ok());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn gate_resets_and_serves_round_two() {
        let gate = CompletionGate::new();

        gate.complete(Ok(ChatResponse::empty()));
        assert!(gate.wait().await.is_ok());

        // second terminal signal after the reset releases the next waiter
        gate.complete(Ok(ChatResponse::empty()));
        assert!(gate.wait().await.is_ok());
    }

    #[tokio::test]
    async fn extra_signal_within_round_is_dropped() {
        let gate = CompletionGate::new();
        gate.complete(Ok(ChatResponse {
            model: "first".into(),
            ..Default::default()
        }));
        gate.complete(Ok(ChatResponse {
            model: "second".into(),
            ..Default::default()
        }));

        let outcome = gate.wait().await.unwrap();
        assert_eq!(outcome.model, "first");
    }

    #[tokio::test]
    async fn failure_releases_waiter_with_error() {
        let gate = Arc::new(CompletionGate::new());
        let signaler = gate.clone();
        tokio::spawn(async move {
            signaler.complete(Err(ferrochat_core::StreamError::Interrupted(
                "connection reset".into(),
            )
            .into()));
        });

        let outcome = gate.wait().await;
        assert!(outcome.is_err());
        assert!(outcome.unwrap_err().to_string().contains("connection reset"));
    }
}
