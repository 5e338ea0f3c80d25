//! Conversation messages

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    User,
    Assistant,
}

/// One entry of the conversation log.
///
/// Entries are immutable once superseded; the trailing assistant entry is the
/// only one ever mutated, and only by content appends while its turn streams.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
    pub created_at_ms: i64,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Empty assistant entry appended when a turn begins, filled in by the
    /// streamed reply.
    pub fn assistant_placeholder() -> Self {
        Self {
            role: MessageRole::Assistant,
            content: String::new(),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        }
    }
}
