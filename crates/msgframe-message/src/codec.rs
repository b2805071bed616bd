//! Value codecs: structured value <-> payload bytes.
//!
//! - [`MsgPackCodec`] - MessagePack via `rmp-serde` (default)
//! - [`JsonCodec`] - UTF-8 JSON via `serde_json`
//!
//! The message layer only ever hands opaque payload bytes to a codec; it
//! never looks inside them.

use serde_json::Value;

use crate::error::{MessageError, Result};

/// Converts structured values to and from frame payloads.
pub trait ValueCodec {
    /// Short name used in logs and CLI output.
    fn name(&self) -> &'static str;

    /// Serialize `value` into payload bytes.
    fn encode(&self, value: &Value) -> Result<Vec<u8>>;

    /// Deserialize payload bytes into a value.
    fn decode(&self, bytes: &[u8]) -> Result<Value>;
}

impl<C: ValueCodec + ?Sized> ValueCodec for Box<C> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        (**self).encode(value)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        (**self).decode(bytes)
    }
}

/// MessagePack codec.
///
/// Structs are written as maps (`to_vec_named`) so field names survive on
/// the wire. Integers use the smallest MessagePack representation.
///
/// Payloads that carry MessagePack `bin` or `ext` data, or maps with
/// non-string keys, have no [`Value`] equivalent and fail to decode.
#[derive(Debug, Clone, Copy, Default)]
pub struct MsgPackCodec;

impl ValueCodec for MsgPackCodec {
    fn name(&self) -> &'static str {
        "msgpack"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|err| MessageError::Serialization(err.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        rmp_serde::from_slice(bytes).map_err(|err| MessageError::Deserialization(err.to_string()))
    }
}

/// JSON codec.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl ValueCodec for JsonCodec {
    fn name(&self) -> &'static str {
        "json"
    }

    fn encode(&self, value: &Value) -> Result<Vec<u8>> {
        serde_json::to_vec(value).map_err(|err| MessageError::Serialization(err.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value> {
        serde_json::from_slice(bytes).map_err(|err| MessageError::Deserialization(err.to_string()))
    }
}
