//! Crate-wide error types

use thiserror::Error;

/// Result alias used across the crate
pub type FreewayResult<T> = Result<T, FreewayError>;

#[derive(Debug, Error)]
pub enum FreewayError {
    /// Connection refused, dropped mid-stream, or any other failure of the
    /// underlying byte transport. Fails the active turn.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A single wire frame carried a payload that is not valid JSON. Local to
    /// the frame; the stream continues.
    #[error("Decode error: {0}")]
    Decode(String),

    /// An operation was called in a state that does not permit it, e.g.
    /// submitting while a turn is already streaming.
    #[error("Protocol misuse: {0}")]
    Protocol(String),

    /// The backend answered with a non-success status. Carries the server's
    /// own error message when the body provides one.
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Client-side input validation failed before any request was made.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}
