//! Turn state machine
//!
//! Orchestrates one submit/stream/finalize cycle: validate the question,
//! open the transport, feed each chunk through the frame decoder, append
//! token fragments to the conversation, and finalize on end-of-stream,
//! error, or cancellation. One chunk is processed at a time; tokens land in
//! the conversation in exactly the order their frames arrive on the wire.

use std::sync::{Arc, Mutex};

use log::{debug, error, warn};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::chat::conversation::Conversation;
use crate::chat::events::{ChatEvent, ChatPublisher, ChatSnapshot};
use crate::stream::decoder::FrameDecoder;
use crate::stream::payload::StreamPayload;
use crate::transport::{CompletionStream, CompletionTransport};
use crate::util::errors::{FreewayError, FreewayResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    /// No turn in flight; `submit` is the only valid entry.
    Idle,
    /// Question accepted, request dispatched, no response yet.
    Submitting,
    /// Response open; chunks are being consumed.
    Streaming,
}

/// Cancels the turn currently (or next) in flight.
///
/// Cloneable and usable from any task, e.g. a Ctrl-C handler while the
/// controller task is blocked on the stream. Cancelling while idle has no
/// effect: each submission installs a fresh token.
#[derive(Clone)]
pub struct TurnCancelHandle {
    current: Arc<Mutex<CancellationToken>>,
}

impl TurnCancelHandle {
    pub fn cancel(&self) {
        if let Ok(token) = self.current.lock() {
            token.cancel();
        }
    }
}

pub struct TurnController {
    conversation: Conversation,
    transport: Arc<dyn CompletionTransport>,
    publisher: ChatPublisher,
    phase: TurnPhase,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl TurnController {
    pub fn new(transport: Arc<dyn CompletionTransport>) -> Self {
        Self {
            conversation: Conversation::new(),
            transport,
            publisher: ChatPublisher::default(),
            phase: TurnPhase::Idle,
            cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Subscribe to the presentation contract: snapshots plus turn failures.
    pub fn subscribe(&mut self) -> tokio::sync::mpsc::UnboundedReceiver<ChatEvent> {
        self.publisher.subscribe()
    }

    pub fn cancel_handle(&self) -> TurnCancelHandle {
        TurnCancelHandle {
            current: Arc::clone(&self.cancel),
        }
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn snapshot(&self) -> ChatSnapshot {
        ChatSnapshot {
            conversation: self.conversation.snapshot(),
            busy: self.phase != TurnPhase::Idle,
        }
    }

    /// Run one full turn for `question`.
    ///
    /// A whitespace-only question is silently ignored. Submitting while a
    /// turn is in flight is rejected without touching the conversation.
    /// Transport and stream failures do NOT surface here: they end the turn,
    /// keep whatever partial content arrived, and are reported once through
    /// the event channel, so the return value is `Err` only for caller bugs.
    pub async fn submit(&mut self, question: &str) -> FreewayResult<()> {
        let question = question.trim();
        if question.is_empty() {
            debug!("Ignoring empty submission");
            return Ok(());
        }
        if self.phase != TurnPhase::Idle {
            return Err(FreewayError::Protocol(format!(
                "submit while a turn is in flight (phase {:?})",
                self.phase
            )));
        }

        // Backstop for the at-most-one-turn invariant; cannot fire after the
        // phase check above unless callers bypass the controller.
        self.conversation.begin_turn(question)?;

        let turn_id = Uuid::new_v4();
        let token = self.install_fresh_token();
        self.phase = TurnPhase::Submitting;
        self.publish_snapshot();
        debug!("Turn {turn_id}: submitting ({} chars)", question.len());

        let stream = match self.transport.open(question).await {
            Ok(stream) => stream,
            Err(cause) => return self.fail_turn(turn_id, cause),
        };

        // Busy display must not wait for the first byte: the turn counts as
        // streaming as soon as the transport accepts the request.
        self.phase = TurnPhase::Streaming;
        self.publish_snapshot();

        match self.consume_stream(turn_id, stream, &token).await {
            Ok(()) => {
                self.conversation.end_turn();
                self.phase = TurnPhase::Idle;
                self.publish_snapshot();
                debug!("Turn {turn_id}: completed");
                Ok(())
            }
            Err(cause) => self.fail_turn(turn_id, cause),
        }
    }

    async fn consume_stream(
        &mut self,
        turn_id: Uuid,
        mut stream: Box<dyn CompletionStream>,
        cancel: &CancellationToken,
    ) -> FreewayResult<()> {
        let mut decoder = FrameDecoder::new();
        loop {
            let chunk = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Turn {turn_id}: cancelled, tearing down stream");
                    return Err(FreewayError::Transport("turn cancelled".to_string()));
                }
                chunk = stream.next_chunk() => chunk,
            };

            match chunk {
                Ok(Some(bytes)) => {
                    if cancel.is_cancelled() {
                        // Chunk raced with cancellation: drop it unprocessed.
                        debug!("Turn {turn_id}: dropping chunk received after cancel");
                        return Err(FreewayError::Transport("turn cancelled".to_string()));
                    }
                    self.apply_frames(decoder.feed(&bytes))?;
                }
                Ok(None) => {
                    self.apply_frames(decoder.finish())?;
                    return Ok(());
                }
                Err(cause) => return Err(cause),
            }
        }
    }

    /// Apply decoded frames in arrival order. Malformed frames are local
    /// failures: logged and skipped, never fatal to the stream.
    fn apply_frames(&mut self, frames: Vec<FreewayResult<StreamPayload>>) -> FreewayResult<()> {
        for frame in frames {
            match frame {
                Ok(payload) => {
                    if let Some(fragment) = payload.token_fragment() {
                        self.conversation.append_token(fragment)?;
                        self.publish_snapshot();
                    }
                }
                Err(cause) => warn!("Skipping undecodable frame: {cause}"),
            }
        }
        Ok(())
    }

    /// End the turn after a failure: release the busy flag, keep the partial
    /// assistant content (a partial answer beats none), report the failure
    /// exactly once on the event channel.
    fn fail_turn(&mut self, turn_id: Uuid, cause: FreewayError) -> FreewayResult<()> {
        error!("Turn {turn_id} failed: {cause}");
        self.conversation.end_turn();
        self.phase = TurnPhase::Idle;
        self.publisher.publish(ChatEvent::TurnFailed {
            reason: cause.to_string(),
        });
        self.publish_snapshot();
        Ok(())
    }

    fn install_fresh_token(&mut self) -> CancellationToken {
        let token = CancellationToken::new();
        if let Ok(mut slot) = self.cancel.lock() {
            *slot = token.clone();
        }
        token
    }

    fn publish_snapshot(&mut self) {
        let snapshot = self.snapshot();
        self.publisher.publish(ChatEvent::Snapshot(snapshot));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::message::MessageRole;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex as StdMutex;

    #[derive(Clone)]
    enum Step {
        Chunk(&'static [u8]),
        Error(&'static str),
        /// Block until cancelled; used to park the stream mid-turn.
        Hang,
    }

    /// Transport replaying one scripted stream per `open` call; streams close
    /// cleanly once their steps run out.
    struct ScriptedTransport {
        scripts: StdMutex<VecDeque<Vec<Step>>>,
        fail_open: bool,
    }

    impl ScriptedTransport {
        fn new(script: Vec<Step>) -> Arc<Self> {
            Self::with_scripts(vec![script])
        }

        fn with_scripts(scripts: Vec<Vec<Step>>) -> Arc<Self> {
            Arc::new(Self {
                scripts: StdMutex::new(scripts.into()),
                fail_open: false,
            })
        }

        fn failing_open() -> Arc<Self> {
            Arc::new(Self {
                scripts: StdMutex::new(VecDeque::new()),
                fail_open: true,
            })
        }
    }

    #[async_trait]
    impl CompletionTransport for ScriptedTransport {
        async fn open(&self, _question: &str) -> FreewayResult<Box<dyn CompletionStream>> {
            if self.fail_open {
                return Err(FreewayError::Transport("connection refused".to_string()));
            }
            let steps = self.scripts.lock().unwrap().pop_front().unwrap_or_default();
            Ok(Box::new(ScriptedStream {
                steps: steps.into(),
            }))
        }
    }

    struct ScriptedStream {
        steps: VecDeque<Step>,
    }

    #[async_trait]
    impl CompletionStream for ScriptedStream {
        async fn next_chunk(&mut self) -> FreewayResult<Option<Vec<u8>>> {
            match self.steps.pop_front() {
                Some(Step::Chunk(bytes)) => Ok(Some(bytes.to_vec())),
                Some(Step::Error(message)) => Err(FreewayError::Transport(message.to_string())),
                Some(Step::Hang) => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                None => Ok(None),
            }
        }
    }

    fn assistant_content(snapshot: &ChatSnapshot) -> &str {
        snapshot
            .conversation
            .iter()
            .rev()
            .find(|message| message.role == MessageRole::Assistant)
            .map(|message| message.content.as_str())
            .unwrap_or("")
    }

    fn failures(events: &mut tokio::sync::mpsc::UnboundedReceiver<ChatEvent>) -> Vec<String> {
        let mut reasons = Vec::new();
        while let Ok(event) = events.try_recv() {
            if let ChatEvent::TurnFailed { reason } = event {
                reasons.push(reason);
            }
        }
        reasons
    }

    #[tokio::test]
    async fn full_turn_accumulates_tokens_in_order() {
        let transport = ScriptedTransport::new(vec![
            Step::Chunk(b"data: {\"token\":\"Os\"}\n\n"),
            // Frame split across two network reads.
            Step::Chunk(b"data: {\"tok"),
            Step::Chunk(b"en\":\"mosis is...\"}\n\n"),
        ]);
        let mut controller = TurnController::new(transport);
        let mut events = controller.subscribe();

        controller.submit("What is osmosis?").await.unwrap();

        let snapshot = controller.snapshot();
        assert!(!snapshot.busy);
        assert_eq!(snapshot.conversation.len(), 2);
        assert_eq!(snapshot.conversation[0].content, "What is osmosis?");
        assert_eq!(assistant_content(&snapshot), "Osmosis is...");

        // Busy went up before any byte arrived and down at the end; the
        // assistant content only ever grew.
        let mut saw_busy = false;
        let mut last_len = 0;
        while let Ok(event) = events.try_recv() {
            if let ChatEvent::Snapshot(snapshot) = event {
                saw_busy |= snapshot.busy;
                let len = assistant_content(&snapshot).len();
                assert!(len >= last_len);
                last_len = len;
            }
        }
        assert!(saw_busy);
    }

    #[tokio::test]
    async fn empty_submission_is_a_noop() {
        let transport = ScriptedTransport::new(vec![]);
        let mut controller = TurnController::new(transport);
        let mut events = controller.subscribe();

        controller.submit("").await.unwrap();
        controller.submit("   \n\t").await.unwrap();

        assert_eq!(controller.snapshot().conversation.len(), 0);
        assert!(!controller.snapshot().busy);
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn transport_open_failure_fails_turn_once() {
        let transport = ScriptedTransport::failing_open();
        let mut controller = TurnController::new(transport);
        let mut events = controller.subscribe();

        controller.submit("question").await.unwrap();

        let snapshot = controller.snapshot();
        assert!(!snapshot.busy);
        // User message and empty placeholder remain visible.
        assert_eq!(snapshot.conversation.len(), 2);
        assert_eq!(assistant_content(&snapshot), "");

        let reasons = failures(&mut events);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("connection refused"));
    }

    #[tokio::test]
    async fn mid_stream_error_preserves_partial_content() {
        let transport = ScriptedTransport::new(vec![
            Step::Chunk(b"data: {\"token\":\"partial\"}\n\n"),
            Step::Error("connection reset"),
        ]);
        let mut controller = TurnController::new(transport);
        let mut events = controller.subscribe();

        controller.submit("question").await.unwrap();

        let snapshot = controller.snapshot();
        assert!(!snapshot.busy);
        assert_eq!(assistant_content(&snapshot), "partial");
        assert_eq!(failures(&mut events).len(), 1);
    }

    #[tokio::test]
    async fn malformed_frames_do_not_abort_the_stream() {
        let transport = ScriptedTransport::new(vec![
            Step::Chunk(b"data: {broken\n\n"),
            Step::Chunk(b"data: {\"token\":\"ok\"}\n\n"),
        ]);
        let mut controller = TurnController::new(transport);
        let mut events = controller.subscribe();

        controller.submit("question").await.unwrap();

        assert_eq!(assistant_content(&controller.snapshot()), "ok");
        assert!(failures(&mut events).is_empty());
    }

    #[tokio::test]
    async fn submit_while_busy_is_rejected_without_mutation() {
        let transport = ScriptedTransport::new(vec![]);
        let mut controller = TurnController::new(transport);
        controller.phase = TurnPhase::Streaming;

        let err = controller.submit("second").await.unwrap_err();
        assert!(matches!(err, FreewayError::Protocol(_)));
        assert!(controller.snapshot().conversation.is_empty());
    }

    #[tokio::test]
    async fn new_turn_can_follow_a_cancelled_one() {
        let transport = ScriptedTransport::with_scripts(vec![
            vec![Step::Hang],
            vec![Step::Chunk(b"data: {\"token\":\"second answer\"}\n\n")],
        ]);
        let mut controller = TurnController::new(transport);
        let handle = controller.cancel_handle();
        let mut events = controller.subscribe();

        let task = tokio::spawn(async move {
            controller.submit("first").await.unwrap();
            controller
        });

        // Wait for the turn to reach streaming (busy snapshot observed).
        loop {
            match events.recv().await.expect("controller alive") {
                ChatEvent::Snapshot(snapshot) if snapshot.busy => break,
                _ => {}
            }
        }

        handle.cancel();
        let mut controller = task.await.unwrap();

        // Conversation holds exactly the one turn's entries.
        assert_eq!(controller.snapshot().conversation.len(), 2);
        assert_eq!(controller.phase(), TurnPhase::Idle);

        controller.submit("second").await.unwrap();
        let snapshot = controller.snapshot();
        assert_eq!(snapshot.conversation.len(), 4);
        assert_eq!(assistant_content(&snapshot), "second answer");
    }

    #[tokio::test]
    async fn cancellation_stops_accumulation_and_fails_turn() {
        let transport = ScriptedTransport::new(vec![
            Step::Chunk(b"data: {\"token\":\"par\"}\n\n"),
            Step::Hang,
        ]);
        let mut controller = TurnController::new(transport);
        let handle = controller.cancel_handle();
        let mut events = controller.subscribe();

        let task = tokio::spawn(async move {
            controller.submit("question").await.unwrap();
            controller
        });

        // Let the first token land before cancelling.
        loop {
            match events.recv().await.expect("controller alive") {
                ChatEvent::Snapshot(snapshot) if assistant_content(&snapshot) == "par" => break,
                _ => {}
            }
        }

        handle.cancel();
        let controller = task.await.unwrap();

        let snapshot = controller.snapshot();
        assert!(!snapshot.busy);
        assert_eq!(assistant_content(&snapshot), "par");

        let reasons = failures(&mut events);
        assert_eq!(reasons.len(), 1);
        assert!(reasons[0].contains("cancelled"));
    }

    #[tokio::test]
    async fn cancel_while_idle_does_not_poison_next_turn() {
        let transport = ScriptedTransport::new(vec![Step::Chunk(b"data: {\"token\":\"hi\"}\n\n")]);
        let mut controller = TurnController::new(transport);
        let handle = controller.cancel_handle();

        handle.cancel();
        controller.submit("question").await.unwrap();

        assert_eq!(assistant_content(&controller.snapshot()), "hi");
    }

    #[tokio::test]
    async fn payloads_without_tokens_change_nothing() {
        let transport = ScriptedTransport::new(vec![
            Step::Chunk(b"data: {\"usage\":{\"total\":3}}\n\n"),
            Step::Chunk(b"data: {\"token\":\"\"}\n\n"),
            Step::Chunk(b"data: {\"token\":\"text\"}\n\n"),
        ]);
        let mut controller = TurnController::new(transport);

        controller.submit("question").await.unwrap();

        assert_eq!(assistant_content(&controller.snapshot()), "text");
    }
}
