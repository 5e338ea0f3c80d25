//! Chat layer
//!
//! Conversation state, the per-turn state machine, and the read-only
//! presentation contract consumed by front-ends

pub mod conversation;
pub mod events;
pub mod message;
pub mod turn;

pub use conversation::Conversation;
pub use events::{ChatEvent, ChatSnapshot};
pub use message::{Message, MessageRole};
pub use turn::{TurnCancelHandle, TurnController, TurnPhase};
