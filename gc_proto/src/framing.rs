//! Varint length-delimited framing used on the CI stream socket.
//!
//! Each frame is a protobuf varint holding the payload length followed by the
//! encoded message. A single read may carry several frames, or end part-way
//! through one; [`decode_frames`] returns every complete frame and reports how
//! many bytes it consumed so the caller can keep the remainder.

use prost::Message;

/// Longest possible encoding of a `u64` varint.
const MAX_VARINT_LEN: usize = 10;

/// Messages decoded from a buffer plus the number of bytes they occupied.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFrames<M> {
    pub messages: Vec<M>,
    pub consumed: usize,
}

/// Encode `message` as a single length-delimited frame.
pub fn encode_frame<M: Message>(message: &M) -> Vec<u8> {
    message.encode_length_delimited_to_vec()
}

/// Decode every complete frame at the front of `buffer`.
///
/// A trailing partial frame (truncated length prefix or payload) is left
/// unconsumed. A complete frame whose payload does not parse as `M` is an
/// error.
pub fn decode_frames<M>(buffer: &[u8]) -> Result<DecodedFrames<M>, prost::DecodeError>
where
    M: Message + Default,
{
    let mut messages = Vec::new();
    let mut cursor = buffer;

    while !cursor.is_empty() {
        if is_truncated_varint(cursor) {
            break;
        }
        let mut payload = cursor;
        let len = prost::encoding::decode_varint(&mut payload)? as usize;
        if payload.len() < len {
            break;
        }
        messages.push(M::decode(&payload[..len])?);
        cursor = &payload[len..];
    }

    Ok(DecodedFrames {
        messages,
        consumed: buffer.len() - cursor.len(),
    })
}

fn is_truncated_varint(bytes: &[u8]) -> bool {
    bytes.len() < MAX_VARINT_LEN && bytes.iter().all(|byte| byte & 0x80 != 0)
}
