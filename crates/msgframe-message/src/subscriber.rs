use msgframe_frame::{Dispatcher, FrameConfig, Reassembler, ReassemblerStats, Topic};

use crate::codec::{MsgPackCodec, ValueCodec};
use crate::message::{decode_message, Message};

/// Message-level counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MessageStats {
    /// Messages delivered to at least one handler.
    pub dispatched: u64,
    /// Messages dropped because nobody subscribed to their topic.
    pub unhandled: u64,
    /// Verified frames whose payload the codec rejected.
    pub deserialize_failures: u64,
}

/// Receives raw stream bytes and delivers decoded [`Message`]s to
/// per-topic handlers.
///
/// Every frame completed by one [`feed`](Self::feed) is verified before any
/// handler runs. Frames whose payload cannot be deserialized are logged,
/// counted and dropped; a handler never sees a placeholder value.
pub struct MessageSubscriber<C = MsgPackCodec> {
    codec: C,
    reassembler: Reassembler,
    dispatcher: Dispatcher<Message>,
    deserialize_failures: u64,
}

impl MessageSubscriber<MsgPackCodec> {
    /// Create a MessagePack subscriber with default configuration.
    pub fn new() -> Self {
        Self::with_codec(MsgPackCodec)
    }
}

impl Default for MessageSubscriber<MsgPackCodec> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: ValueCodec> MessageSubscriber<C> {
    /// Create a subscriber for `codec` with default configuration.
    pub fn with_codec(codec: C) -> Self {
        Self::with_config(codec, FrameConfig::default())
    }

    /// Create a subscriber for `codec` with explicit frame configuration.
    pub fn with_config(codec: C, config: FrameConfig) -> Self {
        Self {
            codec,
            reassembler: Reassembler::with_config(config),
            dispatcher: Dispatcher::new(),
            deserialize_failures: 0,
        }
    }

    /// Consume a chunk of stream bytes and deliver every completed message.
    ///
    /// Returns the number of frames that passed verification in this chunk,
    /// whether or not their payload deserialized.
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let decoded = self.reassembler.feed(bytes);

        for frame in self.reassembler.drain() {
            match decode_message(&self.codec, &frame) {
                Ok(message) => {
                    self.dispatcher.dispatch(&message);
                }
                Err(err) => {
                    self.deserialize_failures += 1;
                    tracing::warn!(
                        topic = frame.topic,
                        len = frame.payload.len(),
                        codec = self.codec.name(),
                        error = %err,
                        "payload rejected by codec, message dropped"
                    );
                }
            }
        }

        decoded
    }

    /// Register `handler` for `topic`, replacing any previous one.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F)
    where
        F: FnMut(&Message) + Send + 'static,
    {
        self.dispatcher.subscribe(topic, handler);
    }

    /// Remove the handler for `topic`.
    pub fn unsubscribe(&mut self, topic: Topic) -> bool {
        self.dispatcher.unsubscribe(topic)
    }

    /// Register a handler that sees every decoded message.
    pub fn subscribe_all<F>(&mut self, handler: F)
    where
        F: FnMut(&Message) + Send + 'static,
    {
        self.dispatcher.subscribe_all(handler);
    }

    /// Remove the catch-all handler.
    pub fn unsubscribe_all(&mut self) -> bool {
        self.dispatcher.unsubscribe_all()
    }

    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.dispatcher.is_subscribed(topic)
    }

    /// Topics with registered handlers, in ascending order.
    pub fn topics(&self) -> Vec<Topic> {
        self.dispatcher.topics()
    }

    /// Discard any partially received frame.
    pub fn reset(&mut self) {
        self.reassembler.reset();
    }

    /// Bytes buffered while waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.reassembler.pending()
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }

    /// Message-level counters, snapshotted.
    pub fn stats(&self) -> MessageStats {
        let dispatch = self.dispatcher.stats();
        MessageStats {
            dispatched: dispatch.dispatched,
            unhandled: dispatch.unhandled,
            deserialize_failures: self.deserialize_failures,
        }
    }

    /// Counters of the underlying reassembler.
    pub fn frame_stats(&self) -> &ReassemblerStats {
        self.reassembler.stats()
    }
}

impl<C: ValueCodec> std::fmt::Debug for MessageSubscriber<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageSubscriber")
            .field("codec", &self.codec.name())
            .field("reassembler", &self.reassembler)
            .field("dispatcher", &self.dispatcher)
            .field("deserialize_failures", &self.deserialize_failures)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use msgframe_frame::encode_to_vec;
    use serde_json::{json, Value};

    use super::*;
    use crate::codec::JsonCodec;
    use crate::message::encode_message;

    type Log = Arc<Mutex<Vec<(u8, Value)>>>;

    fn record(log: &Log) -> impl FnMut(&Message) + Send + 'static {
        let log = Arc::clone(log);
        move |msg: &Message| log.lock().unwrap().push((msg.topic, msg.value.clone()))
    }

    fn stream() -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend(encode_message(&MsgPackCodec, 0x01, &json!("simple")).unwrap());
        bytes.extend(encode_message(&MsgPackCodec, 0x11, &json!([1, 2, 3])).unwrap());
        bytes.extend(encode_message(&MsgPackCodec, 0x21, &json!({"a": {"b": [1.5]}})).unwrap());
        bytes
    }

    #[test]
    fn delivers_values_in_order() {
        let log = Log::default();
        let mut sub = MessageSubscriber::new();
        for topic in [0x01, 0x11, 0x21] {
            sub.subscribe(topic, record(&log));
        }

        assert_eq!(sub.feed(&stream()), 3);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                (0x01, json!("simple")),
                (0x11, json!([1, 2, 3])),
                (0x21, json!({"a": {"b": [1.5]}})),
            ]
        );
        assert_eq!(sub.stats().dispatched, 3);
    }

    #[test]
    fn byte_by_byte_feed_matches() {
        let log = Log::default();
        let mut sub = MessageSubscriber::new();
        sub.subscribe_all(record(&log));

        for byte in stream() {
            sub.feed(&[byte]);
        }

        assert_eq!(log.lock().unwrap().len(), 3);
        assert_eq!(sub.pending(), 0);
    }

    #[test]
    fn undecodable_payload_is_dropped_not_delivered() {
        let mut bytes = encode_to_vec(0x01, &[0xc1]);
        bytes.extend(encode_message(&MsgPackCodec, 0x01, &json!(true)).unwrap());

        let log = Log::default();
        let mut sub = MessageSubscriber::new();
        sub.subscribe(0x01, record(&log));

        assert_eq!(sub.feed(&bytes), 2);
        assert_eq!(*log.lock().unwrap(), vec![(0x01, json!(true))]);
        assert_eq!(sub.stats().deserialize_failures, 1);
        assert_eq!(sub.frame_stats().errors(), 0);
    }

    #[test]
    fn corrupted_frame_is_counted_separately() {
        let mut bad = encode_message(&MsgPackCodec, 0x11, &json!([1, 2, 3])).unwrap();
        bad[3] ^= 0x04;

        let mut sub = MessageSubscriber::new();
        sub.subscribe_all(|_| {});
        sub.feed(&bad);

        assert_eq!(sub.frame_stats().checksum_mismatches, 1);
        assert_eq!(sub.stats().deserialize_failures, 0);
        assert_eq!(sub.stats().dispatched, 0);
    }

    #[test]
    fn unsubscribe_suppresses_delivery() {
        let log = Log::default();
        let mut sub = MessageSubscriber::new();
        sub.subscribe(0x11, record(&log));
        assert!(sub.unsubscribe(0x11));
        assert!(!sub.is_subscribed(0x11));

        assert_eq!(sub.feed(&stream()), 3);
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(sub.stats().unhandled, 3);
    }

    #[test]
    fn json_codec_subscriber() {
        let log = Log::default();
        let mut sub = MessageSubscriber::with_codec(JsonCodec);
        sub.subscribe(7, record(&log));

        sub.feed(&encode_message(&JsonCodec, 7, &json!({"on": false})).unwrap());
        assert_eq!(*log.lock().unwrap(), vec![(7, json!({"on": false}))]);
        assert_eq!(sub.codec().name(), "json");
    }
}
