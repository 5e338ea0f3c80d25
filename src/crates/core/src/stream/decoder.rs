//! Incremental wire frame decoding
//!
//! The completion service streams `data: <json>` frames separated by a blank
//! line over a chunked response body. Chunk boundaries are arbitrary: a read
//! may end inside the marker, inside the JSON, or exactly on a delimiter, so
//! the decoder keeps the trailing incomplete frame buffered across calls.

use log::{debug, trace};

use crate::stream::payload::StreamPayload;
use crate::util::errors::{FreewayError, FreewayResult};

/// Marker prefix selecting a frame for decoding.
const DATA_MARKER: &str = "data: ";

/// Frame terminator (blank line).
const FRAME_DELIMITER: &[u8] = b"\n\n";

/// Stateful decoder turning raw byte chunks into payloads.
///
/// One decoder instance covers one response stream; construct a fresh one per
/// turn.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    carry: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode every complete frame available in `chunk` plus the buffered
    /// carry-over. The trailing incomplete frame, if any, stays buffered for
    /// the next call.
    ///
    /// A frame whose payload fails to parse yields an `Err` item; decoding
    /// continues with the following frames.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<FreewayResult<StreamPayload>> {
        self.carry.extend_from_slice(chunk);

        let mut decoded = Vec::new();
        while let Some(end) = find_delimiter(&self.carry) {
            let frame: Vec<u8> = self.carry.drain(..end + FRAME_DELIMITER.len()).collect();
            let frame = &frame[..end];
            if let Some(result) = decode_frame(frame) {
                decoded.push(result);
            }
        }
        decoded
    }

    /// Flush at end-of-stream.
    ///
    /// A buffered fragment that happens to be one complete well-formed frame
    /// is decoded; anything else is discarded. The protocol gives no way to
    /// tell a truncated frame from a stream that simply closed, so a parse
    /// failure here is not reported as an error.
    pub fn finish(&mut self) -> Vec<FreewayResult<StreamPayload>> {
        let remainder = std::mem::take(&mut self.carry);
        if remainder.iter().all(|byte| byte.is_ascii_whitespace()) {
            return Vec::new();
        }

        match decode_frame(&remainder) {
            Some(Ok(payload)) => vec![Ok(payload)],
            Some(Err(error)) => {
                debug!("Discarding incomplete trailing frame at end-of-stream: {error}");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Bytes currently buffered as a partial frame.
    pub fn pending_len(&self) -> usize {
        self.carry.len()
    }
}

/// Decode one delimiter-separated frame.
///
/// Returns `None` for frames the protocol does not select: blank ones and
/// ones without the `data: ` marker.
fn decode_frame(frame: &[u8]) -> Option<FreewayResult<StreamPayload>> {
    let text = match std::str::from_utf8(frame) {
        Ok(text) => text.trim(),
        Err(error) => {
            return Some(Err(FreewayError::Decode(format!(
                "frame is not valid UTF-8: {error}"
            ))));
        }
    };

    if text.is_empty() {
        return None;
    }

    let Some(raw) = text.strip_prefix(DATA_MARKER) else {
        trace!("Skipping frame without data marker: {text:?}");
        return None;
    };

    match serde_json::from_str::<StreamPayload>(raw) {
        Ok(payload) => Some(Ok(payload)),
        Err(error) => Some(Err(FreewayError::Decode(format!(
            "invalid frame payload: {error}, data: {raw}"
        )))),
    }
}

fn find_delimiter(buffer: &[u8]) -> Option<usize> {
    buffer
        .windows(FRAME_DELIMITER.len())
        .position(|window| window == FRAME_DELIMITER)
}
