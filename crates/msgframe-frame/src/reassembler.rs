//! Incremental reassembly of frames from an arbitrarily chunked byte stream.

use std::collections::vec_deque::Drain;
use std::collections::VecDeque;

use bytes::{Buf, BytesMut};

use crate::codec::{decode_frame, Frame, FrameConfig, DELIMITER};
use crate::error::FrameError;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Counters for everything a [`Reassembler`] has seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblerStats {
    /// Frames that passed decoding and checksum verification.
    pub frames_decoded: u64,
    /// Candidates shorter than a topic plus a checksum.
    pub too_short: u64,
    /// Candidates whose checksum did not match.
    pub checksum_mismatches: u64,
    /// Candidates with invalid COBS escaping.
    pub malformed: u64,
    /// Times the buffer exceeded `max_buffer_size` and was discarded.
    pub overflows: u64,
}

impl ReassemblerStats {
    /// Total number of rejected candidates and overflows.
    pub fn errors(&self) -> u64 {
        self.too_short + self.checksum_mismatches + self.malformed + self.overflows
    }
}

/// Splits an incoming byte stream on the frame delimiter and decodes each
/// candidate.
///
/// Decoded frames are queued in arrival order until taken with
/// [`next_frame`](Self::next_frame) or [`drain`](Self::drain). A candidate that
/// fails to decode is logged, counted and dropped; it never stops later frames
/// from being recovered.
#[derive(Debug)]
pub struct Reassembler {
    buf: BytesMut,
    /// Prefix of `buf` already known to be delimiter-free.
    scanned: usize,
    /// Set after an overflow; bytes are dropped up to the next delimiter.
    discarding: bool,
    ready: VecDeque<Frame>,
    config: FrameConfig,
    stats: ReassemblerStats,
}

impl Reassembler {
    /// Create a reassembler with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a reassembler with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanned: 0,
            discarding: false,
            ready: VecDeque::new(),
            config,
            stats: ReassemblerStats::default(),
        }
    }

    /// Append `bytes` and decode every complete frame now in the buffer.
    ///
    /// Returns the number of frames queued by this call.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        if bytes.is_empty() {
            return 0;
        }
        tracing::trace!(len = bytes.len(), buffered = self.buf.len(), "feed");

        self.buf.extend_from_slice(bytes);
        let before = self.ready.len();

        while let Some(offset) = self.buf[self.scanned..]
            .iter()
            .position(|&b| b == DELIMITER)
        {
            let candidate = self.buf.split_to(self.scanned + offset);
            self.buf.advance(1);
            self.scanned = 0;

            if self.discarding {
                self.discarding = false;
                tracing::debug!(len = candidate.len(), "dropped tail of oversized frame");
                continue;
            }

            match decode_frame(&candidate) {
                Ok(frame) => {
                    self.stats.frames_decoded += 1;
                    self.ready.push_back(frame);
                }
                Err(err) => self.record_rejection(&err, candidate.len()),
            }
        }
        self.scanned = self.buf.len();

        if let Some(max) = self.config.max_buffer_size {
            if self.buf.len() > max {
                tracing::warn!(
                    buffered = self.buf.len(),
                    max,
                    "reassembly buffer overflow, discarding partial frame"
                );
                self.stats.overflows += 1;
                self.buf.clear();
                self.scanned = 0;
                self.discarding = true;
            }
        }

        self.ready.len() - before
    }

    fn record_rejection(&mut self, err: &FrameError, len: usize) {
        match err {
            FrameError::FrameTooShort { .. } => self.stats.too_short += 1,
            FrameError::ChecksumMismatch { .. } => self.stats.checksum_mismatches += 1,
            FrameError::MalformedCobs { .. } => self.stats.malformed += 1,
            _ => {}
        }
        tracing::warn!(error = %err, len, "decode error, frame dropped");
    }

    /// Take the oldest decoded frame, if any.
    pub fn next_frame(&mut self) -> Option<Frame> {
        self.ready.pop_front()
    }

    /// Take all decoded frames in arrival order.
    pub fn drain(&mut self) -> Drain<'_, Frame> {
        self.ready.drain(..)
    }

    /// Number of decoded frames waiting to be taken.
    pub fn queued(&self) -> usize {
        self.ready.len()
    }

    /// Number of buffered bytes not yet terminated by a delimiter.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// True while a partial frame is buffered.
    pub fn is_parsing(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Discard buffered bytes and queued frames. Statistics are kept.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.scanned = 0;
        self.discarding = false;
        self.ready.clear();
    }

    /// Decode statistics since creation.
    pub fn stats(&self) -> &ReassemblerStats {
        &self.stats
    }

    /// Current configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::encode_to_vec;

    fn wire(frames: &[(u8, Vec<u8>)]) -> Vec<u8> {
        frames
            .iter()
            .flat_map(|(topic, payload)| encode_to_vec(*topic, payload))
            .collect()
    }

    fn collect(r: &mut Reassembler) -> Vec<(u8, Vec<u8>)> {
        r.drain().map(|f| (f.topic, f.payload.to_vec())).collect()
    }

    #[test]
    fn feed_single_frame() {
        let mut r = Reassembler::new();
        assert_eq!(r.feed(&encode_to_vec(1, b"hello")), 1);
        assert_eq!(collect(&mut r), vec![(1, b"hello".to_vec())]);
        assert_eq!(r.pending(), 0);
        assert!(!r.is_parsing());
    }

    #[test]
    fn feed_empty_is_noop() {
        let mut r = Reassembler::new();
        assert_eq!(r.feed(&[]), 0);
        assert_eq!(r.pending(), 0);
        assert_eq!(r.stats(), &ReassemblerStats::default());
    }

    #[test]
    fn partial_frame_waits_for_delimiter() {
        let bytes = encode_to_vec(2, b"partial");
        let (head, tail) = bytes.split_at(4);

        let mut r = Reassembler::new();
        assert_eq!(r.feed(head), 0);
        assert_eq!(r.pending(), 4);
        assert!(r.is_parsing());

        assert_eq!(r.feed(tail), 1);
        assert_eq!(r.next_frame().unwrap().payload.as_ref(), b"partial");
        assert!(r.next_frame().is_none());
    }

    #[test]
    fn byte_by_byte_matches_single_feed() {
        let bytes = wire(&[
            (1, b"one".to_vec()),
            (2, vec![0, 0, 0]),
            (3, Vec::new()),
            (4, vec![0xFF; 300]),
        ]);

        let mut whole = Reassembler::new();
        whole.feed(&bytes);

        let mut split = Reassembler::new();
        for b in &bytes {
            split.feed(std::slice::from_ref(b));
        }

        assert_eq!(collect(&mut whole), collect(&mut split));
        assert_eq!(whole.stats(), split.stats());
        assert_eq!(split.stats().frames_decoded, 4);
    }

    #[test]
    fn garbled_frame_between_valid_frames() {
        let mut bytes = encode_to_vec(1, b"first");
        let mut garbled = encode_to_vec(2, b"garbled");
        garbled[3] ^= 0x40;
        bytes.extend_from_slice(&garbled);
        bytes.extend_from_slice(&encode_to_vec(3, b"third"));

        let mut r = Reassembler::new();
        assert_eq!(r.feed(&bytes), 2);
        assert_eq!(
            collect(&mut r),
            vec![(1, b"first".to_vec()), (3, b"third".to_vec())]
        );
        assert_eq!(r.stats().checksum_mismatches, 1);
        assert_eq!(r.stats().errors(), 1);
    }

    #[test]
    fn adjacent_delimiters_are_too_short() {
        let mut r = Reassembler::new();
        let mut bytes = vec![0x00, 0x00];
        bytes.extend_from_slice(&encode_to_vec(5, b"ok"));

        assert_eq!(r.feed(&bytes), 1);
        assert_eq!(r.stats().too_short, 2);
        assert_eq!(r.next_frame().unwrap().topic, 5);
    }

    #[test]
    fn leading_noise_is_dropped_on_resync() {
        let mut bytes = vec![0x13, 0x37, 0x42];
        bytes.extend_from_slice(&encode_to_vec(6, b"after-noise"));
        bytes.extend_from_slice(&encode_to_vec(7, b"second"));

        let mut r = Reassembler::new();
        r.feed(&bytes);
        // The noise merges with the first frame into one candidate.
        assert_eq!(collect(&mut r), vec![(7, b"second".to_vec())]);
        assert_eq!(r.stats().errors(), 1);
    }

    #[test]
    fn overflow_discards_and_resyncs() {
        let cfg = FrameConfig {
            max_buffer_size: Some(16),
            ..FrameConfig::default()
        };
        let mut r = Reassembler::with_config(cfg);

        assert_eq!(r.feed(&[0x11; 20]), 0);
        assert_eq!(r.pending(), 0);
        assert_eq!(r.stats().overflows, 1);

        let mut rest = vec![0x22; 4];
        rest.push(DELIMITER);
        rest.extend_from_slice(&encode_to_vec(9, b"fine"));
        assert_eq!(r.feed(&rest), 1);
        assert_eq!(r.next_frame().unwrap().payload.as_ref(), b"fine");
        assert_eq!(r.stats().errors(), 1);
    }

    #[test]
    fn reset_discards_partial_and_queued() {
        let mut r = Reassembler::new();
        let mut bytes = encode_to_vec(1, b"queued");
        bytes.extend_from_slice(&[0x05, 0x01, 0x02]);
        r.feed(&bytes);
        assert_eq!(r.queued(), 1);
        assert_eq!(r.pending(), 3);

        r.reset();
        assert_eq!(r.queued(), 0);
        assert_eq!(r.pending(), 0);
        assert_eq!(r.stats().frames_decoded, 1);
    }
}
