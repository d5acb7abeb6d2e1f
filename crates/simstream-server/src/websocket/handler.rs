//! Frame request handling: decode, resolve against the cursor, encode.

use bytes::Bytes;
use metrics::counter;
use simstream_core::{FrameCursor, StreamError, decode_request, encode_frame};
use tracing::{debug, warn};

use crate::metrics::{FRAMES_SERVED_TOTAL, MESSAGES_DROPPED_TOTAL};

/// Outcome of one inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HandleResult {
    /// Send `frame` back.
    Reply {
        /// Encoded frame message.
        frame: Bytes,
        /// How the cursor produced it.
        outcome: &'static str,
    },
    /// No reply; the message was dropped.
    Dropped(StreamError),
}

impl HandleResult {
    /// The frame to send, if any.
    pub fn into_reply(self) -> Option<Bytes> {
        match self {
            Self::Reply { frame, .. } => Some(frame),
            Self::Dropped(_) => None,
        }
    }
}

/// Answer one frame request.
///
/// Malformed requests and generator failures are logged and dropped; the
/// connection stays open either way.
pub fn handle_message(message: &[u8], cursor: &mut FrameCursor) -> HandleResult {
    let requested = match decode_request(message) {
        Ok(index) => index,
        Err(e) => return dropped(e),
    };

    let resolution = match cursor.resolve(requested) {
        Ok(r) => r,
        Err(e) => return dropped(e),
    };
    let outcome = resolution.outcome();
    debug!(requested, outcome, position = cursor.position(), "frame resolved");

    match encode_frame(requested, &resolution.payload()) {
        Ok(frame) => {
            counter!(FRAMES_SERVED_TOTAL, "outcome" => outcome).increment(1);
            HandleResult::Reply { frame, outcome }
        }
        Err(e) => dropped(e),
    }
}

fn dropped(error: StreamError) -> HandleResult {
    warn!(error = %error, kind = error.error_kind(), "frame request dropped");
    counter!(MESSAGES_DROPPED_TOTAL, "kind" => error.error_kind()).increment(1);
    HandleResult::Dropped(error)
}
