//! Presentation contract
//!
//! The read-only view pushed to front-ends: the ordered conversation plus a
//! busy flag, republished after every state transition and every token
//! append. Turn failures travel on the same channel as a distinct event;
//! snapshots themselves never carry errors.

use serde::Serialize;
use tokio::sync::mpsc;

use crate::chat::message::Message;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub conversation: Vec<Message>,
    /// True while a turn is submitting or streaming.
    pub busy: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChatEvent {
    /// Updated view of the conversation.
    Snapshot(ChatSnapshot),
    /// The active turn failed. Partial assistant content already accumulated
    /// stays in the conversation; a final `Snapshot` with `busy: false`
    /// follows.
    TurnFailed { reason: String },
}

/// Fan-out of chat events to any number of subscribers.
///
/// Subscribers that dropped their receiver are pruned on the next publish.
#[derive(Debug, Default)]
pub(crate) struct ChatPublisher {
    subscribers: Vec<mpsc::UnboundedSender<ChatEvent>>,
}

impl ChatPublisher {
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: ChatEvent) {
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }
}
