use std::io::Write;

use msgframe_frame::{FrameConfig, FrameWriter, Topic};
use serde::Serialize;
use serde_json::Value;

use crate::codec::{MsgPackCodec, ValueCodec};
use crate::error::{MessageError, Result};

/// Serializes values and writes them as frames to any `Write` stream.
#[derive(Debug)]
pub struct MessageWriter<T, C = MsgPackCodec> {
    frames: FrameWriter<T>,
    codec: C,
}

impl<T: Write> MessageWriter<T, MsgPackCodec> {
    /// Create a MessagePack writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_codec(inner, MsgPackCodec, FrameConfig::default())
    }
}

impl<T: Write, C: ValueCodec> MessageWriter<T, C> {
    pub fn with_codec(inner: T, codec: C, config: FrameConfig) -> Self {
        Self {
            frames: FrameWriter::with_config(inner, config),
            codec,
        }
    }

    /// Serialize `value` and send it on `topic`.
    ///
    /// Nothing is written if serialization fails.
    pub fn send(&mut self, topic: Topic, value: &Value) -> Result<()> {
        let payload = self.codec.encode(value)?;
        self.frames.send(topic, &payload)?;
        tracing::debug!(topic, len = payload.len(), codec = self.codec.name(), "sent message");
        Ok(())
    }

    /// Serialize any `Serialize` type and send it on `topic`.
    pub fn send_serializable<V>(&mut self, topic: Topic, value: &V) -> Result<()>
    where
        V: Serialize + ?Sized,
    {
        let value =
            serde_json::to_value(value).map_err(|err| MessageError::Serialization(err.to_string()))?;
        self.send(topic, &value)
    }

    pub fn get_ref(&self) -> &T {
        self.frames.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.frames.get_mut()
    }

    pub fn into_inner(self) -> T {
        self.frames.into_inner()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}
