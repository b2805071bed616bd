//! Blocking frame output.
//!
//! A [`FrameWriter`] encodes one or more frames into a scratch buffer and
//! hands the whole buffer to the stream before flushing, so a frame is never
//! interleaved with bytes from another `send` on the same writer.

use std::io::{self, ErrorKind, Write};
use std::net::TcpStream;

use bytes::BytesMut;

use crate::codec::{encode_frame, Frame, FrameConfig, Topic};
use crate::error::{FrameError, Result};

const SCRATCH_CAPACITY: usize = 8 * 1024;

/// Topic-oriented frame sink over any `Write` stream.
#[derive(Debug)]
pub struct FrameWriter<T> {
    inner: T,
    scratch: BytesMut,
    config: FrameConfig,
    frames_sent: u64,
}

impl<T: Write> FrameWriter<T> {
    /// Create a writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            scratch: BytesMut::with_capacity(SCRATCH_CAPACITY),
            config,
            frames_sent: 0,
        }
    }

    /// Frame `payload` under `topic` and push it to the stream.
    ///
    /// Oversized payloads are rejected before anything is written.
    pub fn send(&mut self, topic: Topic, payload: &[u8]) -> Result<()> {
        self.scratch.clear();
        self.stage(topic, payload)?;
        self.commit(1)
    }

    /// Send an already built [`Frame`].
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.topic, &frame.payload)
    }

    /// Send several frames with a single write and flush.
    ///
    /// Every payload is checked first; if any is too large nothing is sent.
    pub fn send_batch<'a, I>(&mut self, frames: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a Frame>,
    {
        self.scratch.clear();
        let mut staged = 0u64;
        for frame in frames {
            self.stage(frame.topic, &frame.payload)?;
            staged += 1;
        }
        if staged == 0 {
            return Ok(());
        }
        self.commit(staged)
    }

    fn stage(&mut self, topic: Topic, payload: &[u8]) -> Result<()> {
        let max = self.config.max_payload_size;
        if payload.len() > max {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max,
            });
        }
        encode_frame(topic, payload, &mut self.scratch);
        Ok(())
    }

    fn commit(&mut self, frames: u64) -> Result<()> {
        // A configured write timeout surfaces as WouldBlock; only a
        // non-blocking stream without one may spin on it.
        let spin_on_would_block = self.config.write_timeout.is_none();

        let mut rest = &self.scratch[..];
        while !rest.is_empty() {
            match self.inner.write(rest) {
                Ok(0) => return Err(FrameError::ConnectionClosed),
                Ok(n) => rest = &rest[n..],
                Err(err) if is_transient(&err, spin_on_would_block) => {}
                Err(err) => return Err(err.into()),
            }
        }

        loop {
            match self.inner.flush() {
                Ok(()) => break,
                Err(err) if is_transient(&err, spin_on_would_block) => {}
                Err(err) => return Err(err.into()),
            }
        }

        self.frames_sent += frames;
        tracing::trace!(frames, bytes = self.scratch.len(), "frames written");
        Ok(())
    }

    /// Frames successfully written and flushed so far.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }

    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Give back the stream. Nothing is buffered between sends.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

fn is_transient(err: &io::Error, spin_on_would_block: bool) -> bool {
    match err.kind() {
        ErrorKind::Interrupted => true,
        ErrorKind::WouldBlock => spin_on_would_block,
        _ => false,
    }
}

impl FrameWriter<TcpStream> {
    /// Wrap a TCP stream, applying `config.write_timeout` to the socket.
    pub fn with_config_tcp(inner: TcpStream, config: FrameConfig) -> Result<Self> {
        inner.set_write_timeout(config.write_timeout)?;
        Ok(Self::with_config(inner, config))
    }
}
