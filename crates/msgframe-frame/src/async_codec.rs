//! Tokio codec for delimited frames.
//!
//! Plugs the wire format into `tokio_util::codec::Framed` so async tasks can
//! exchange [`Frame`]s. Invalid frames are skipped the same way the blocking
//! [`FrameReader`](crate::FrameReader) skips them.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::{debug, trace, warn};

use crate::codec::{decode_frame, encode_frame, Frame, FrameConfig, DELIMITER};
use crate::error::FrameError;

/// Counters kept by a [`FrameCodec`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CodecStats {
    /// Frames encoded
    pub frames_encoded: u64,
    /// Frames decoded
    pub frames_decoded: u64,
    /// Delimited chunks that failed to decode
    pub frames_rejected: u64,
    /// Wire bytes written, delimiters included
    pub bytes_written: u64,
    /// Wire bytes consumed, delimiters included
    pub bytes_read: u64,
}

/// Tokio codec producing and consuming [`Frame`]s.
#[derive(Debug, Default)]
pub struct FrameCodec {
    config: FrameConfig,
    /// Prefix of the read buffer already known to be delimiter-free.
    next_index: usize,
    /// Set after an overflow; the next delimited chunk is the overflowed
    /// frame's tail and is dropped unread.
    discarding: bool,
    stats: CodecStats,
}

impl FrameCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            config,
            next_index: 0,
            discarding: false,
            stats: CodecStats::default(),
        }
    }

    pub fn stats(&self) -> &CodecStats {
        &self.stats
    }

    /// Reset statistics
    pub fn reset_stats(&mut self) {
        self.stats = CodecStats::default();
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|&b| b == DELIMITER) else {
                self.next_index = src.len();
                if let Some(max) = self.config.max_buffer_size {
                    if src.len() > max {
                        warn!(buffered = src.len(), max, "read buffer overflow, discarding");
                        self.stats.frames_rejected += 1;
                        self.stats.bytes_read += src.len() as u64;
                        src.clear();
                        self.next_index = 0;
                        self.discarding = true;
                    }
                }
                return Ok(None);
            };

            let chunk = src.split_to(self.next_index + offset);
            src.advance(1);
            self.next_index = 0;
            self.stats.bytes_read += chunk.len() as u64 + 1;

            if self.discarding {
                self.discarding = false;
                debug!(len = chunk.len(), "dropped tail of oversized frame");
                continue;
            }

            match decode_frame(&chunk) {
                Ok(frame) => {
                    self.stats.frames_decoded += 1;
                    trace!(topic = frame.topic, len = frame.payload.len(), "decoded frame");
                    return Ok(Some(frame));
                }
                Err(err) => {
                    self.stats.frames_rejected += 1;
                    warn!(error = %err, len = chunk.len(), "frame decode error, skipping");
                }
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        if let Some(frame) = self.decode(buf)? {
            return Ok(Some(frame));
        }
        if !buf.is_empty() {
            debug!(pending = buf.len(), "eof inside a frame, discarding");
            self.stats.bytes_read += buf.len() as u64;
            buf.clear();
            self.next_index = 0;
        }
        self.discarding = false;
        Ok(None)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: item.payload.len(),
                max: self.config.max_payload_size,
            });
        }

        let before = dst.len();
        encode_frame(item.topic, &item.payload, dst);

        self.stats.frames_encoded += 1;
        self.stats.bytes_written += (dst.len() - before) as u64;
        Ok(())
    }
}
