use msgframe_frame::{encode_to_vec, Frame, Routed, Topic};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::codec::ValueCodec;
use crate::error::{MessageError, Result};

/// A decoded message: a topic and the structured value carried in its payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub topic: Topic,
    pub value: Value,
}

impl Message {
    pub fn new(topic: Topic, value: Value) -> Self {
        Self { topic, value }
    }

    /// Convert the value into a concrete type.
    pub fn deserialize_into<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.value).map_err(|err| MessageError::Deserialization(err.to_string()))
    }
}

impl Routed for Message {
    fn topic(&self) -> Topic {
        self.topic
    }
}

/// Serialize `value` and frame it on `topic`.
///
/// On a codec failure no bytes are produced.
pub fn encode_message<C>(codec: &C, topic: Topic, value: &Value) -> Result<Vec<u8>>
where
    C: ValueCodec + ?Sized,
{
    let payload = codec.encode(value)?;
    Ok(encode_to_vec(topic, &payload))
}

/// Serialize any `Serialize` type and frame it on `topic`.
pub fn encode_serializable<C, T>(codec: &C, topic: Topic, value: &T) -> Result<Vec<u8>>
where
    C: ValueCodec + ?Sized,
    T: Serialize + ?Sized,
{
    let value =
        serde_json::to_value(value).map_err(|err| MessageError::Serialization(err.to_string()))?;
    encode_message(codec, topic, &value)
}

/// Turn a verified frame back into a [`Message`].
pub fn decode_message<C>(codec: &C, frame: &Frame) -> Result<Message>
where
    C: ValueCodec + ?Sized,
{
    let value = codec.decode(&frame.payload)?;
    Ok(Message::new(frame.topic, value))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use msgframe_frame::{decode_frame, DELIMITER};
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::codec::{JsonCodec, MsgPackCodec};

    fn frame_of(wire: &[u8]) -> Frame {
        assert_eq!(wire.last(), Some(&DELIMITER));
        decode_frame(&wire[..wire.len() - 1]).unwrap()
    }

    #[test]
    fn reference_vectors() {
        assert_eq!(
            encode_message(&MsgPackCodec, 0x11, &json!([123456789, 123456, 123])).unwrap(),
            vec![
                0x09, 0x11, 0x93, 0xce, 0x07, 0x5b, 0xcd, 0x15, 0xce, 0x06, 0x01, 0xe2, 0x40,
                0x7b, 0xa3, 0x00
            ]
        );
        assert_eq!(
            encode_message(&MsgPackCodec, 0x10, &json!([1, 2, 3])).unwrap(),
            vec![0x07, 0x10, 0x93, 0x01, 0x02, 0x03, 0x24, 0x00]
        );
        assert_eq!(
            encode_message(&MsgPackCodec, 0x21, &json!({"a": 1})).unwrap(),
            vec![0x07, 0x21, 0x81, 0xa1, 0x61, 0x01, 0xe3, 0x00]
        );
    }

    #[test]
    fn decode_recovers_value() {
        let wire = encode_message(&MsgPackCodec, 0x31, &json!({"k": [1, "two", 3.5]})).unwrap();
        let msg = decode_message(&MsgPackCodec, &frame_of(&wire)).unwrap();
        assert_eq!(msg, Message::new(0x31, json!({"k": [1, "two", 3.5]})));
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Reading {
        sensor: String,
        value: i32,
    }

    #[test]
    fn serializable_struct_travels_as_map() {
        let reading = Reading {
            sensor: "t0".to_string(),
            value: -7,
        };
        let wire = encode_serializable(&MsgPackCodec, 2, &reading).unwrap();
        let msg = decode_message(&MsgPackCodec, &frame_of(&wire)).unwrap();

        assert_eq!(msg.value, json!({"sensor": "t0", "value": -7}));
        assert_eq!(msg.deserialize_into::<Reading>().unwrap(), reading);
    }

    #[test]
    fn unrepresentable_value_produces_no_bytes() {
        let mut map = BTreeMap::new();
        map.insert((1u8, 2u8), "tuple key");

        let err = encode_serializable(&MsgPackCodec, 1, &map).unwrap_err();
        assert!(matches!(err, MessageError::Serialization(_)));
    }

    #[test]
    fn deserialize_into_wrong_shape_fails() {
        let msg = Message::new(1, json!([1, 2]));
        let err = msg.deserialize_into::<Reading>().unwrap_err();
        assert!(matches!(err, MessageError::Deserialization(_)));
    }

    #[test]
    fn codec_mismatch_is_a_deserialization_error() {
        let wire = encode_message(&MsgPackCodec, 5, &json!({"a": 1})).unwrap();
        let err = decode_message(&JsonCodec, &frame_of(&wire)).unwrap_err();
        assert!(matches!(err, MessageError::Deserialization(_)));
    }
}
