//! Structured-value messages on top of `msgframe-frame`.
//!
//! A message is a topic plus a [`serde_json::Value`]. On send, a
//! [`ValueCodec`] turns the value into payload bytes which are then framed;
//! on receive, verified frames are decoded back into values before the topic
//! handler runs.

pub mod codec;
pub mod error;
pub mod message;
pub mod subscriber;
pub mod writer;

pub use codec::{JsonCodec, MsgPackCodec, ValueCodec};
pub use error::{MessageError, Result};
pub use message::{decode_message, encode_message, encode_serializable, Message};
pub use subscriber::{MessageStats, MessageSubscriber};
pub use writer::MessageWriter;

pub use serde_json::{json, Value};
