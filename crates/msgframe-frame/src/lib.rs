//! Delimited, checksummed message framing with topic dispatch.
//!
//! Every frame on the wire is:
//! - A 1-byte topic identifier
//! - The payload, any bytes including `0x00`
//! - A CRC-8 of the payload
//!
//! The whole body is COBS-escaped so it contains no `0x00`, and a single
//! `0x00` delimiter closes the frame. A receiver can therefore resynchronize
//! at the next delimiter after any corruption.
//!
//! [`Reassembler`] turns arbitrarily fragmented input into frames,
//! [`Subscriber`] routes them to per-topic handlers, and [`FrameReader`] /
//! [`FrameWriter`] drive blocking streams.

pub mod checksum;
pub mod cobs;
pub mod codec;
pub mod dispatcher;
pub mod error;
pub mod reader;
pub mod reassembler;
pub mod subscriber;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::{CodecStats, FrameCodec};
pub use checksum::crc8;
pub use codec::{
    decode_frame, encode_frame, encode_to_vec, Frame, FrameConfig, Topic, DEFAULT_MAX_PAYLOAD,
    DELIMITER, MIN_FRAME_LEN,
};
pub use dispatcher::{Delivery, DispatchStats, Dispatcher, Handler, Routed};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use reassembler::{Reassembler, ReassemblerStats};
pub use subscriber::Subscriber;
pub use writer::FrameWriter;
