use bytes::{BufMut, Bytes, BytesMut};

use crate::checksum::crc8;
use crate::cobs;
use crate::error::{FrameError, Result};

/// 8-bit topic identifier carried by every frame.
pub type Topic = u8;

/// Frame delimiter. Never appears inside an encoded frame body.
pub const DELIMITER: u8 = 0x00;

/// Minimum un-escaped frame size: topic (1) + payload (0) + checksum (1).
pub const MIN_FRAME_LEN: usize = 2;

/// Default maximum payload size accepted by writers: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// A decoded frame: a topic and an owned payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The topic this frame was published on.
    pub topic: Topic,
    /// The frame payload (checksum already verified and stripped).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(topic: Topic, payload: impl Into<Bytes>) -> Self {
        Self {
            topic,
            payload: payload.into(),
        }
    }

    /// Upper bound on the wire size of this frame, delimiter included.
    pub fn max_wire_size(&self) -> usize {
        cobs::max_encoded_len(self.payload.len() + MIN_FRAME_LEN) + 1
    }

    /// Encode this frame into a fresh buffer.
    pub fn encode(&self) -> BytesMut {
        let mut dst = BytesMut::with_capacity(self.max_wire_size());
        encode_frame(self.topic, &self.payload, &mut dst);
        dst
    }
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────────────────────────────┬───────────┐
/// │ COBS( topic (1B) │ payload │ crc8(payload) ) │ 0x00      │
/// │ no 0x00 bytes in this region                 │ delimiter │
/// └──────────────────────────────────────────────┴───────────┘
/// ```
///
/// The checksum covers the payload only; the topic byte is not protected.
pub fn encode_frame(topic: Topic, payload: &[u8], dst: &mut BytesMut) {
    let mut raw = Vec::with_capacity(payload.len() + MIN_FRAME_LEN);
    raw.push(topic);
    raw.extend_from_slice(payload);
    raw.push(crc8(payload));

    dst.reserve(cobs::max_encoded_len(raw.len()) + 1);
    cobs::encode_into(&raw, dst);
    dst.put_u8(DELIMITER);

    tracing::trace!(topic, len = payload.len(), "encoded frame");
}

/// Encode a frame into an owned byte vector.
pub fn encode_to_vec(topic: Topic, payload: &[u8]) -> Vec<u8> {
    let mut dst = BytesMut::new();
    encode_frame(topic, payload, &mut dst);
    dst.to_vec()
}

/// Decode one delimited chunk.
///
/// `chunk` is the bytes between two delimiters; the delimiter itself must not
/// be included. The returned payload is an owned copy, independent of `chunk`.
pub fn decode_frame(chunk: &[u8]) -> Result<Frame> {
    let raw = Bytes::from(cobs::decode(chunk)?);
    if raw.len() < MIN_FRAME_LEN {
        return Err(FrameError::FrameTooShort { len: raw.len() });
    }

    let topic = raw[0];
    let received = raw[raw.len() - 1];
    let payload = raw.slice(1..raw.len() - 1);
    let computed = crc8(&payload);

    tracing::trace!(topic, len = payload.len(), received, computed, "decoded frame");

    if received != computed {
        return Err(FrameError::ChecksumMismatch { received, computed });
    }

    Ok(Frame { topic, payload })
}

/// Configuration shared by the reassembler, readers and writers.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes accepted by writers. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Cap on un-delimited bytes held by a reassembler. Default: unbounded.
    pub max_buffer_size: Option<usize>,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            max_buffer_size: None,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
