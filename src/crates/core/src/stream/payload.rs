//! Decoded frame payloads

use serde::Deserialize;
use serde_json::{Map, Value};

/// JSON payload carried by one wire frame.
///
/// The only field the client interprets is `token`, an incremental fragment
/// of the assistant's answer. Everything else the server may send is captured
/// opaquely so future payload fields never break decoding.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StreamPayload {
    #[serde(default)]
    pub token: Option<String>,

    /// Unrecognized payload fields, passed through untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StreamPayload {
    /// The token fragment, if present and non-empty.
    ///
    /// An empty or absent fragment is a no-op for the conversation, not an
    /// error, so callers can filter on this in one place.
    pub fn token_fragment(&self) -> Option<&str> {
        self.token.as_deref().filter(|fragment| !fragment.is_empty())
    }
}
