//! The stage chain: ordered interceptors wrapping a terminal model invocation.
//!
//! A request enters the chain → each stage may rewrite it via `before`,
//! then delegates inward → the innermost (terminal) stage invokes the
//! model → each stage may rewrite the response via `after` on the way
//! back out. Standard nested-interceptor semantics: `before` hooks fire
//! in chain order, `after` hooks in strict reverse order, exactly once
//! each per request.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use tokio::sync::mpsc;
use tracing::warn;

use ferrochat_core::{CallKind, ChatRequest, ChatResponse, Result, Stage, StreamEvent};

/// The innermost link of a chain for single-shot calls.
#[async_trait]
pub trait CallTerminal: Send + Sync {
    fn name(&self) -> &str;

    /// Invoke the model and produce the complete response.
    async fn invoke(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// The innermost link of a chain for streamed calls.
#[async_trait]
pub trait StreamTerminal: Send + Sync {
    fn name(&self) -> &str;

    /// Invoke the model and produce the event stream.
    async fn invoke(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>>;
}

/// An ordered list of stages plus one terminal per call kind.
///
/// Stages are stable-sorted by `order()` at construction; insertion order
/// breaks ties. A chain built without a terminal for the requested kind
/// returns an empty response rather than failing.
pub struct StageChain {
    stages: Vec<Arc<dyn Stage>>,
    call_terminal: Option<Arc<dyn CallTerminal>>,
    stream_terminal: Option<Arc<dyn StreamTerminal>>,
}

impl StageChain {
    /// Build a chain from non-terminal stages.
    pub fn new(mut stages: Vec<Arc<dyn Stage>>) -> Self {
        // sort_by_key is stable: equal orders keep insertion order
        stages.sort_by_key(|s| s.order());
        Self {
            stages,
            call_terminal: None,
            stream_terminal: None,
        }
    }

    /// Attach the terminal stage for single-shot calls.
    pub fn with_call_terminal(mut self, terminal: Arc<dyn CallTerminal>) -> Self {
        self.call_terminal = Some(terminal);
        self
    }

    /// Attach the terminal stage for streamed calls.
    pub fn with_stream_terminal(mut self, terminal: Arc<dyn StreamTerminal>) -> Self {
        self.stream_terminal = Some(terminal);
        self
    }

    /// Stage names in execution order, for diagnostics.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run a single-shot call through the whole chain.
    pub async fn call(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.call_next(request, 0).await
    }

    /// Delegate to the next stage at or after `index` for the sync kind.
    ///
    /// Stages that do not support [`CallKind::Call`] are skipped. Past the
    /// last stage, the call terminal is invoked.
    pub fn call_next(
        &self,
        request: ChatRequest,
        index: usize,
    ) -> BoxFuture<'_, Result<ChatResponse>> {
        Box::pin(async move {
            let mut i = index;
            while i < self.stages.len() && !self.stages[i].supports(CallKind::Call) {
                i += 1;
            }
            match self.stages.get(i) {
                Some(stage) => {
                    let request = stage.before(request).await?;
                    let response = self.call_next(request, i + 1).await?;
                    stage.after(response).await
                }
                None => match &self.call_terminal {
                    Some(terminal) => terminal.invoke(request).await,
                    None => {
                        warn!("stage chain has no call terminal, returning empty response");
                        Ok(ChatResponse::empty())
                    }
                },
            }
        })
    }

    /// Run a streamed call through the whole chain.
    ///
    /// `before` hooks run in order on the caller's task before the stream
    /// opens. Events are forwarded as they arrive; when the terminal emits
    /// its final [`StreamEvent::Completed`], the `after` hooks run in
    /// strict reverse order on the reconstructed response before it is
    /// surfaced.
    pub async fn stream(&self, request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
        let applicable: Vec<Arc<dyn Stage>> = self
            .stages
            .iter()
            .filter(|s| s.supports(CallKind::Stream))
            .cloned()
            .collect();

        let mut request = request;
        for stage in &applicable {
            request = stage.before(request).await?;
        }

        let mut upstream = match &self.stream_terminal {
            Some(terminal) => terminal.invoke(request).await?,
            None => {
                warn!("stage chain has no stream terminal, returning empty response");
                let (tx, rx) = mpsc::channel(1);
                let _ = tx
                    .send(StreamEvent::Completed {
                        response: Box::new(ChatResponse::empty()),
                    })
                    .await;
                return Ok(rx);
            }
        };

        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            while let Some(event) = upstream.recv().await {
                let out = match event {
                    StreamEvent::Completed { response } => {
                        let mut resp = *response;
                        for stage in applicable.iter().rev() {
                            resp = match stage.after(resp).await {
                                Ok(resp) => resp,
                                Err(e) => {
                                    let _ = tx
                                        .send(StreamEvent::Failed {
                                            message: e.to_string(),
                                        })
                                        .await;
                                    return;
                                }
                            };
                        }
                        StreamEvent::Completed {
                            response: Box::new(resp),
                        }
                    }
                    other => other,
                };
                if tx.send(out).await.is_err() {
                    return; // receiver dropped
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ferrochat_core::{Generation, Message};
    use std::sync::Mutex;

    /// Records hook firing order into a shared journal.
    struct RecordingStage {
        label: &'static str,
        order: i32,
        kinds: Vec<CallKind>,
        journal: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait]
    impl Stage for RecordingStage {
        fn name(&self) -> &str {
            self.label
        }

        fn order(&self) -> i32 {
            self.order
        }

        fn supports(&self, kind: CallKind) -> bool {
            self.kinds.contains(&kind)
        }

        async fn before(&self, request: ChatRequest) -> Result<ChatRequest> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("before:{}", self.label));
            Ok(request)
        }

        async fn after(&self, response: ChatResponse) -> Result<ChatResponse> {
            self.journal
                .lock()
                .unwrap()
                .push(format!("after:{}", self.label));
            Ok(response)
        }
    }

    struct EchoTerminal;

    #[async_trait]
    impl CallTerminal for EchoTerminal {
        fn name(&self) -> &str {
            "echo_terminal"
        }

        async fn invoke(&self, _request: ChatRequest) -> Result<ChatResponse> {
            Ok(ChatResponse {
                generations: vec![Generation {
                    index: 0,
                    message: Message::assistant("terminal response"),
                    finish_reason: None,
                }],
                ..Default::default()
            })
        }
    }

    struct EchoStreamTerminal;

    #[async_trait]
    impl StreamTerminal for EchoStreamTerminal {
        fn name(&self) -> &str {
            "echo_stream_terminal"
        }

        async fn invoke(&self, _request: ChatRequest) -> Result<mpsc::Receiver<StreamEvent>> {
            let (tx, rx) = mpsc::channel(4);
            tokio::spawn(async move {
                let _ = tx
                    .send(StreamEvent::Content {
                        delta: "chunk".into(),
                    })
                    .await;
                let _ = tx
                    .send(StreamEvent::Completed {
                        response: Box::new(ChatResponse {
                            generations: vec![Generation {
                                index: 0,
                                message: Message::assistant("chunk"),
                                finish_reason: None,
                            }],
                            ..Default::default()
                        }),
                    })
                    .await;
            });
            Ok(rx)
        }
    }

    fn stage(
        label: &'static str,
        order: i32,
        kinds: Vec<CallKind>,
        journal: &Arc<Mutex<Vec<String>>>,
    ) -> Arc<dyn Stage> {
        Arc::new(RecordingStage {
            label,
            order,
            kinds,
            journal: journal.clone(),
        })
    }

    #[tokio::test]
    async fn before_in_order_after_in_reverse() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let chain = StageChain::new(vec![
            stage("a", 0, vec![CallKind::Call], &journal),
            stage("b", 0, vec![CallKind::Call], &journal),
            stage("c", 0, vec![CallKind::Call], &journal),
        ])
        .with_call_terminal(Arc::new(EchoTerminal));

        let resp = chain.call(ChatRequest::default()).await.unwrap();
        assert_eq!(resp.text(), "terminal response");

        let entries = journal.lock().unwrap().clone();
        assert_eq!(
            entries,
            vec!["before:a", "before:b", "before:c", "after:c", "after:b", "after:a"]
        );
    }

    #[tokio::test]
    async fn stages_sorted_by_order_stable() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        // declared out of order; two share order 5 and must keep insertion order
        let chain = StageChain::new(vec![
            stage("late", 10, vec![CallKind::Call], &journal),
            stage("first_of_5", 5, vec![CallKind::Call], &journal),
            stage("early", -1, vec![CallKind::Call], &journal),
            stage("second_of_5", 5, vec![CallKind::Call], &journal),
        ])
        .with_call_terminal(Arc::new(EchoTerminal));

        assert_eq!(
            chain.stage_names(),
            vec!["early", "first_of_5", "second_of_5", "late"]
        );

        chain.call(ChatRequest::default()).await.unwrap();
        let entries = journal.lock().unwrap().clone();
        assert_eq!(entries[0], "before:early");
        assert_eq!(entries[1], "before:first_of_5");
        assert_eq!(entries[2], "before:second_of_5");
        assert_eq!(entries[3], "before:late");
    }

    #[tokio::test]
    async fn stage_not_supporting_kind_is_skipped() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let chain = StageChain::new(vec![
            stage("sync_only", 0, vec![CallKind::Call], &journal),
            stage("stream_only", 0, vec![CallKind::Stream], &journal),
        ])
        .with_call_terminal(Arc::new(EchoTerminal));

        chain.call(ChatRequest::default()).await.unwrap();
        let entries = journal.lock().unwrap().clone();
        assert_eq!(entries, vec!["before:sync_only", "after:sync_only"]);
    }

    #[tokio::test]
    async fn chain_without_terminal_returns_empty_response() {
        let chain = StageChain::new(vec![]);
        let resp = chain.call(ChatRequest::default()).await.unwrap();
        assert!(resp.generations.is_empty());
    }

    #[tokio::test]
    async fn stream_forwards_events_and_applies_after_hooks() {
        let journal = Arc::new(Mutex::new(Vec::new()));
        let chain = StageChain::new(vec![
            stage("a", 0, vec![CallKind::Stream], &journal),
            stage("b", 0, vec![CallKind::Stream], &journal),
        ])
        .with_stream_terminal(Arc::new(EchoStreamTerminal));

        let mut rx = chain.stream(ChatRequest::default()).await.unwrap();

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, StreamEvent::Content { ref delta } if delta == "chunk"));

        let second = rx.recv().await.unwrap();
        match second {
            StreamEvent::Completed { response } => assert_eq!(response.text(), "chunk"),
            other => panic!("expected completed, got {other:?}"),
        }

        let entries = journal.lock().unwrap().clone();
        assert_eq!(entries, vec!["before:a", "before:b", "after:b", "after:a"]);
    }

    #[tokio::test]
    async fn stream_without_terminal_completes_empty() {
        let chain = StageChain::new(vec![]);
        let mut rx = chain.stream(ChatRequest::default()).await.unwrap();
        match rx.recv().await.unwrap() {
            StreamEvent::Completed { response } => assert!(response.generations.is_empty()),
            other => panic!("expected completed, got {other:?}"),
        }
    }
}
