//! Topic-tagged, checksummed message framing for byte streams.
//!
//! msgframe delimits messages inside a continuous byte stream (serial lines,
//! TCP, UDP), tags each one with an 8-bit topic, guards the payload with a
//! CRC-8 and dispatches verified messages to per-topic handlers.
//!
//! # Crate Structure
//!
//! - [`frame`] - COBS framing, CRC-8, stream reassembly and topic dispatch
//! - [`message`] - Structured values (MessagePack or JSON) carried in frames

/// Re-export frame types.
pub mod frame {
    pub use msgframe_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use msgframe_message::*;
}
