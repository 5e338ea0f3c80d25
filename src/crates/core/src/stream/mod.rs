//! Stream layer
//!
//! Decodes the completion service's chunked wire stream into payloads

pub mod decoder;
pub mod payload;

pub use decoder::FrameDecoder;
pub use payload::StreamPayload;
