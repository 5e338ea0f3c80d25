//! Conversation accumulator
//!
//! Owns the ordered message log and applies turn-scoped mutations. The log is
//! append-only: entries keep their index for the lifetime of the conversation
//! and only the trailing assistant entry is ever written to, so views can
//! hold stable indices instead of rebuilding the sequence per token.

use crate::chat::message::{Message, MessageRole};
use crate::util::errors::{FreewayError, FreewayResult};

#[derive(Debug, Default)]
pub struct Conversation {
    entries: Vec<Message>,
    turn_active: bool,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a turn: append the user's question plus an empty assistant
    /// placeholder for the streamed reply.
    ///
    /// Rejected while another turn is active; this is the enforcement point
    /// for the at-most-one-turn invariant.
    pub fn begin_turn(&mut self, question: &str) -> FreewayResult<()> {
        if self.turn_active {
            return Err(FreewayError::Protocol(
                "cannot begin a turn while another is active".to_string(),
            ));
        }
        self.entries.push(Message::user(question));
        self.entries.push(Message::assistant_placeholder());
        self.turn_active = true;
        Ok(())
    }

    /// Append a token fragment to the in-flight assistant entry.
    ///
    /// An empty fragment is a no-op. Calling without an active turn is a
    /// caller bug and is rejected without mutating anything.
    pub fn append_token(&mut self, fragment: &str) -> FreewayResult<()> {
        if fragment.is_empty() {
            return Ok(());
        }
        if !self.turn_active {
            return Err(FreewayError::Protocol(
                "append_token called with no active turn".to_string(),
            ));
        }
        match self.entries.last_mut() {
            Some(entry) if entry.role == MessageRole::Assistant => {
                entry.content.push_str(fragment);
                Ok(())
            }
            _ => Err(FreewayError::Protocol(
                "active turn has no trailing assistant entry".to_string(),
            )),
        }
    }

    /// Mark the current turn inactive. The assistant entry's content is final
    /// for display; no further appends will be issued. Idempotent.
    pub fn end_turn(&mut self) {
        self.turn_active = false;
    }

    pub fn turn_active(&self) -> bool {
        self.turn_active
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Owned copy of the full ordered log for the presentation contract.
    /// Never a live alias, so view-layer reads cannot race the next append.
    pub fn snapshot(&self) -> Vec<Message> {
        self.entries.clone()
    }
}
