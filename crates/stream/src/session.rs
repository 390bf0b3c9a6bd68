//! Stream session — wires the decoder, the assembler, the event channel,
//! and the completion gate together for one model stream.
//!
//! The transport pushes raw bytes (or extracted payloads) in; consumers
//! observe increments on the event channel and the final reconstructed
//! response through the gate. One session is reusable across the rounds
//! of a streaming tool-calling loop: the assembler resets after each
//! finalization and the gate re-arms after each wait.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, warn};

use ferrochat_core::{StreamError, StreamEvent};

use crate::assembler::{Emission, StreamAssembler};
use crate::frame::{SseFrame, SseLineDecoder};
use crate::gate::CompletionGate;

/// One live stream hook-up.
pub struct StreamSession {
    decoder: Mutex<SseLineDecoder>,
    assembler: Mutex<StreamAssembler>,
    gate: Arc<CompletionGate>,
    events: mpsc::Sender<StreamEvent>,
}

impl StreamSession {
    /// Create a session and the event receiver its consumer reads.
    pub fn channel(buffer: usize) -> (Arc<Self>, mpsc::Receiver<StreamEvent>) {
        let (tx, rx) = mpsc::channel(buffer);
        let session = Arc::new(Self {
            decoder: Mutex::new(SseLineDecoder::new()),
            assembler: Mutex::new(StreamAssembler::new()),
            gate: Arc::new(CompletionGate::new()),
            events: tx,
        });
        (session, rx)
    }

    /// The completion gate callers block on for the final response.
    pub fn gate(&self) -> Arc<CompletionGate> {
        self.gate.clone()
    }

    /// Feed raw transport bytes.
    pub async fn push_bytes(&self, bytes: &[u8]) {
        let payloads = self.decoder.lock().unwrap().push(bytes);
        for payload in payloads {
            self.push_payload(&payload).await;
        }
    }

    /// Feed one already-extracted `data:` payload.
    pub async fn push_payload(&self, payload: &str) {
        let frame = match SseFrame::parse(payload) {
            Ok(frame) => frame,
            Err(err) => {
                warn!(error = %err, "malformed stream frame");
                self.fail(err).await;
                return;
            }
        };

        let emission = self.assembler.lock().unwrap().apply(frame);
        self.dispatch(emission).await;
    }

    /// Treat a transport close as end of stream.
    ///
    /// A round still in flight is finalized as if the sentinel had
    /// arrived; a session that already finalized (or never started) is
    /// left untouched.
    pub async fn close(&self) {
        let emission = {
            let mut assembler = self.assembler.lock().unwrap();
            if assembler.in_flight() {
                Some(assembler.apply(SseFrame::Done))
            } else {
                None
            }
        };
        if let Some(emission) = emission {
            self.dispatch(emission).await;
        }
    }

    /// Report a transport failure: the waiter is released with an error
    /// instead of left hanging.
    pub async fn fail(&self, error: StreamError) {
        let _ = self
            .events
            .send(StreamEvent::Failed {
                message: error.to_string(),
            })
            .await;
        self.gate.complete(Err(error.into()));
    }

    async fn dispatch(&self, emission: Emission) {
        match emission {
            Emission::Skipped => {}
            Emission::Content(delta) => {
                let _ = self.events.send(StreamEvent::Content { delta }).await;
            }
            Emission::Reasoning(delta) => {
                let _ = self.events.send(StreamEvent::Reasoning { delta }).await;
            }
            Emission::Completed { trailing, response } => {
                if let Some(delta) = trailing {
                    let _ = self.events.send(StreamEvent::Content { delta }).await;
                }
                debug!(
                    tool_calls = response.tool_calls().len(),
                    total_tokens = response.usage.total_tokens,
                    "stream finalized"
                );
                let _ = self
                    .events
                    .send(StreamEvent::Completed {
                        response: Box::new(response.clone()),
                    })
                    .await;
                self.gate.complete(Ok(response));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochat_core::FinishReason;

    async fn drain(rx: &mut mpsc::Receiver<StreamEvent>, n: usize) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for _ in 0..n {
            events.push(rx.recv().await.expect("event expected"));
        }
        events
    }

    #[tokio::test]
    async fn session_emits_increments_and_releases_gate() {
        let (session, mut rx) = StreamSession::channel(16);
        let gate = session.gate();

        session
            .push_payload(r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#)
            .await;
        session
            .push_payload(r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":null}]}"#)
            .await;
        session.push_payload("[DONE]").await;

        let events = drain(&mut rx, 3).await;
        assert!(matches!(&events[0], StreamEvent::Content { delta } if delta == "Hel"));
        assert!(matches!(&events[1], StreamEvent::Content { delta } if delta == "lo"));
        assert!(matches!(&events[2], StreamEvent::Completed { .. }));

        let response = gate.wait().await.unwrap();
        assert_eq!(response.text(), "Hello");
    }

    #[tokio::test]
    async fn session_accepts_raw_bytes() {
        let (session, mut rx) = StreamSession::channel(16);

        session
            .push_bytes(
                b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"},\"finish_reason\":null}]}\n\ndata: [DONE]\n",
            )
            .await;

        let events = drain(&mut rx, 2).await;
        assert!(matches!(&events[0], StreamEvent::Content { delta } if delta == "Hi"));
        assert!(matches!(&events[1], StreamEvent::Completed { .. }));
    }

    #[tokio::test]
    async fn malformed_frame_fails_the_stream() {
        let (session, mut rx) = StreamSession::channel(16);
        let gate = session.gate();

        session.push_payload("{definitely not json").await;

        match rx.recv().await.unwrap() {
            StreamEvent::Failed { message } => assert!(message.contains("Malformed")),
            other => panic!("expected failure event, got {other:?}"),
        }
        assert!(gate.wait().await.is_err());
    }

    #[tokio::test]
    async fn transport_failure_releases_waiter() {
        let (session, mut rx) = StreamSession::channel(16);
        let gate = session.gate();

        let waiter = tokio::spawn(async move { gate.wait().await });

        session
            .fail(StreamError::Interrupted("connection reset".into()))
            .await;

        assert!(matches!(rx.recv().await.unwrap(), StreamEvent::Failed { .. }));
        assert!(waiter.await.unwrap().is_err());
    }

    #[tokio::test]
    async fn session_is_reusable_across_rounds() {
        let (session, mut rx) = StreamSession::channel(16);
        let gate = session.gate();

        // round 1: the model requests a tool
        session
            .push_payload(
                r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"c1","function":{"name":"get_weather","arguments":"{\"city\":\"Paris\"}"}}]},"finish_reason":null}]}"#,
            )
            .await;
        session
            .push_payload(r#"{"choices":[{"delta":{},"finish_reason":"tool_calls"}]}"#)
            .await;

        let round1 = gate.wait().await.unwrap();
        assert_eq!(round1.tool_calls().len(), 1);
        assert_eq!(
            round1.first().unwrap().finish_reason,
            Some(FinishReason::ToolCalls)
        );

        // round 2 on the same session: a plain text answer
        session
            .push_payload(r#"{"choices":[{"delta":{"content":"Sunny, 14C"},"finish_reason":null}]}"#)
            .await;
        session.push_payload("[DONE]").await;

        let round2 = gate.wait().await.unwrap();
        assert_eq!(round2.text(), "Sunny, 14C");
        assert!(round2.tool_calls().is_empty());

        // both completions were also observable on the event channel
        let mut completions = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StreamEvent::Completed { .. }) {
                completions += 1;
            }
        }
        assert_eq!(completions, 2);
    }

    #[tokio::test]
    async fn close_finalizes_round_in_flight() {
        let (session, mut rx) = StreamSession::channel(16);
        let gate = session.gate();

        session
            .push_payload(r#"{"choices":[{"delta":{"content":"partial"},"finish_reason":null}]}"#)
            .await;
        session.close().await;

        let events = drain(&mut rx, 2).await;
        assert!(matches!(&events[1], StreamEvent::Completed { .. }));
        assert_eq!(gate.wait().await.unwrap().text(), "partial");
    }

    #[tokio::test]
    async fn close_after_finalization_is_a_noop() {
        let (session, mut rx) = StreamSession::channel(16);

        session
            .push_payload(r#"{"choices":[{"delta":{"content":"done"},"finish_reason":"stop"}]}"#)
            .await;
        session.close().await;

        let mut completions = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, StreamEvent::Completed { .. }) {
                completions += 1;
            }
        }
        assert_eq!(completions, 1);
    }

    #[tokio::test]
    async fn keep_alive_never_reaches_the_consumer() {
        let (session, mut rx) = StreamSession::channel(16);

        session
            .push_payload(
                r#"{"choices":[{"delta":{"role":"assistant","content":""},"finish_reason":null}]}"#,
            )
            .await;
        session.push_payload("[DONE]").await;

        // the first observable event is already the completion
        assert!(matches!(
            rx.recv().await.unwrap(),
            StreamEvent::Completed { .. }
        ));
    }
}
