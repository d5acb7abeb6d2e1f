//! Binary wire format.
//!
//! Inbound (client → server) a request is exactly [`FRAME_INDEX_BYTES`]
//! bytes: the big-endian signed frame index.
//!
//! Outbound (server → client) a frame message is
//!
//! ```text
//! +----------------+----------------+---------------------------+
//! | index: i32 BE  | length: i32 BE | payload (`length` bytes)  |
//! +----------------+----------------+---------------------------+
//! ```
//!
//! The payload is the frame's flat `f32` array in native byte order. An empty
//! payload means the frame is unavailable.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::errors::{Result, StreamError};

/// Width of the frame index field.
pub const FRAME_INDEX_BYTES: usize = 4;
/// Width of the payload length field.
pub const LENGTH_BYTES: usize = 4;
/// Fixed header size of an outbound frame message.
pub const HEADER_BYTES: usize = FRAME_INDEX_BYTES + LENGTH_BYTES;
/// Width of one payload element (`f32`).
pub const ELEMENT_BYTES: usize = 4;

/// A decoded outbound frame message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameMessage {
    /// Frame index, echoing the request.
    pub index: i32,
    /// Raw payload; empty when the frame is unavailable.
    pub payload: Bytes,
}

impl FrameMessage {
    /// Whether the server reported the frame as unavailable.
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Encode a frame message.
///
/// Fails only when the payload does not fit the signed 32-bit length field.
pub fn encode_frame(index: i32, payload: &[u8]) -> Result<Bytes> {
    let len = i32::try_from(payload.len()).map_err(|_| {
        StreamError::Internal(format!("payload of {} bytes exceeds length field", payload.len()))
    })?;
    let mut buf = BytesMut::with_capacity(HEADER_BYTES + payload.len());
    buf.put_i32(index);
    buf.put_i32(len);
    buf.put_slice(payload);
    Ok(buf.freeze())
}

/// Decode a frame message.
pub fn decode_frame(message: &[u8]) -> Result<FrameMessage> {
    if message.len() < HEADER_BYTES {
        return Err(StreamError::decode(
            message.len(),
            format!("frame header needs {HEADER_BYTES} bytes"),
        ));
    }
    let mut header = &message[..HEADER_BYTES];
    let index = header.get_i32();
    let len = header.get_i32();
    let body = &message[HEADER_BYTES..];
    match usize::try_from(len) {
        Ok(len) if len == body.len() => Ok(FrameMessage {
            index,
            payload: Bytes::copy_from_slice(body),
        }),
        _ => Err(StreamError::decode(
            message.len(),
            format!("length field {len} does not match {} payload bytes", body.len()),
        )),
    }
}

/// Encode a frame request.
pub fn encode_request(index: i32) -> [u8; FRAME_INDEX_BYTES] {
    index.to_be_bytes()
}

/// Decode a frame request.
pub fn decode_request(message: &[u8]) -> Result<i32> {
    let bytes: [u8; FRAME_INDEX_BYTES] = message.try_into().map_err(|_| {
        StreamError::decode(
            message.len(),
            format!("frame request must be exactly {FRAME_INDEX_BYTES} bytes"),
        )
    })?;
    Ok(i32::from_be_bytes(bytes))
}

/// Serialize `f32` elements into a native-endian payload.
pub fn pack_elements(elements: &[f32]) -> Bytes {
    let mut buf = BytesMut::with_capacity(elements.len() * ELEMENT_BYTES);
    for &v in elements {
        buf.put_f32_ne(v);
    }
    buf.freeze()
}

/// Read a native-endian payload back into `f32` elements.
///
/// Trailing bytes that do not make up a whole element are ignored.
pub fn unpack_elements(mut payload: &[u8]) -> Vec<f32> {
    let mut out = Vec::with_capacity(payload.len() / ELEMENT_BYTES);
    while payload.remaining() >= ELEMENT_BYTES {
        out.push(payload.get_f32_ne());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn frame_layout_is_big_endian_header() {
        let msg = encode_frame(7, &[1, 2, 3, 4]).unwrap();
        assert_eq!(&msg[..], &[0, 0, 0, 7, 0, 0, 0, 4, 1, 2, 3, 4]);
    }

    #[test]
    fn empty_payload_is_header_only() {
        let msg = encode_frame(15, &[]).unwrap();
        assert_eq!(msg.len(), HEADER_BYTES);
        let decoded = decode_frame(&msg).unwrap();
        assert_eq!(decoded.index, 15);
        assert!(decoded.is_empty());
    }

    #[test]
    fn negative_index_survives_encoding() {
        let msg = encode_frame(-1, &[9]).unwrap();
        assert_eq!(&msg[..4], &[0xff, 0xff, 0xff, 0xff]);
        assert_eq!(decode_frame(&msg).unwrap().index, -1);
    }

    #[test]
    fn request_decodes_big_endian() {
        assert_eq!(decode_request(&[0, 0, 1, 0]).unwrap(), 256);
        assert_eq!(decode_request(&encode_request(-3)).unwrap(), -3);
    }

    #[test]
    fn request_with_wrong_length_is_rejected() {
        for len in [0usize, 1, 3, 5, 8] {
            let err = decode_request(&vec![0u8; len]).unwrap_err();
            assert!(matches!(err, StreamError::Decode { len: l, .. } if l == len));
        }
    }

    #[test]
    fn truncated_frame_header_is_rejected() {
        let err = decode_frame(&[0, 0, 0, 1, 0, 0]).unwrap_err();
        assert_eq!(err.error_kind(), "decode");
    }

    #[test]
    fn frame_with_lying_length_is_rejected() {
        let mut msg = encode_frame(1, &[1, 2, 3, 4]).unwrap().to_vec();
        msg.pop();
        assert!(decode_frame(&msg).is_err());
    }

    #[test]
    fn elements_pack_in_native_order() {
        let payload = pack_elements(&[1.5, -2.0]);
        assert_eq!(payload.len(), 8);
        assert_eq!(&payload[..4], &1.5f32.to_ne_bytes());
        assert_eq!(unpack_elements(&payload), vec![1.5, -2.0]);
    }

    #[test]
    fn partial_trailing_element_is_ignored() {
        let mut payload = pack_elements(&[0.25, 7.0, -1.0]).to_vec();
        payload.extend_from_slice(&[0xde, 0xad, 0xbe]);
        assert_eq!(unpack_elements(&payload), vec![0.25, 7.0, -1.0]);
        assert!(unpack_elements(&payload[..3]).is_empty());
    }

    proptest! {
        #[test]
        fn frame_roundtrips_index_and_length(index in any::<i32>(), len in 0usize..4096) {
            let payload = vec![0xabu8; len];
            let msg = encode_frame(index, &payload).unwrap();
            prop_assert_eq!(msg.len(), HEADER_BYTES + len);
            let decoded = decode_frame(&msg).unwrap();
            prop_assert_eq!(decoded.index, index);
            prop_assert_eq!(decoded.payload.len(), len);
        }

        #[test]
        fn requests_of_other_lengths_never_decode(bytes in proptest::collection::vec(any::<u8>(), 0..16)) {
            prop_assume!(bytes.len() != FRAME_INDEX_BYTES);
            prop_assert!(decode_request(&bytes).is_err());
        }
    }
}
