//! Topic subscription over a byte stream.
//!
//! [`Subscriber`] pairs a [`Reassembler`] with a [`Dispatcher`] so callers
//! only feed bytes and register handlers.

use crate::codec::{Frame, FrameConfig, Topic};
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::reassembler::{Reassembler, ReassemblerStats};

/// Feeds raw stream bytes through a [`Reassembler`] and hands every decoded
/// frame to the subscribed handler for its topic.
///
/// All frames completed by one [`feed`](Self::feed) call are decoded before
/// any handler runs, and handlers are invoked in arrival order. Handlers are
/// owned by the subscriber, so they cannot call back into `feed` on it.
#[derive(Debug, Default)]
pub struct Subscriber {
    reassembler: Reassembler,
    dispatcher: Dispatcher<Frame>,
}

impl Subscriber {
    /// Create a subscriber with default configuration.
    pub fn new() -> Self {
        Self::with_config(FrameConfig::default())
    }

    /// Create a subscriber with explicit configuration.
    pub fn with_config(config: FrameConfig) -> Self {
        Self {
            reassembler: Reassembler::with_config(config),
            dispatcher: Dispatcher::new(),
        }
    }

    /// Consume a chunk of stream bytes and dispatch every completed frame.
    ///
    /// Returns the number of frames decoded from this chunk. Corrupt frames
    /// are dropped and counted in [`reassembler_stats`](Self::reassembler_stats).
    pub fn feed(&mut self, bytes: &[u8]) -> usize {
        let decoded = self.reassembler.feed(bytes);
        for frame in self.reassembler.drain() {
            self.dispatcher.dispatch(&frame);
        }
        decoded
    }

    /// Register `handler` for `topic`, replacing any previous one.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F)
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        self.dispatcher.subscribe(topic, handler);
    }

    /// Remove the handler for `topic`.
    pub fn unsubscribe(&mut self, topic: Topic) -> bool {
        self.dispatcher.unsubscribe(topic)
    }

    /// Register a handler that sees every decoded frame.
    pub fn subscribe_all<F>(&mut self, handler: F)
    where
        F: FnMut(&Frame) + Send + 'static,
    {
        self.dispatcher.subscribe_all(handler);
    }

    /// Remove the catch-all handler.
    pub fn unsubscribe_all(&mut self) -> bool {
        self.dispatcher.unsubscribe_all()
    }

    /// Discard any partially received frame.
    pub fn reset(&mut self) {
        self.reassembler.reset();
    }

    /// Bytes buffered while waiting for a delimiter.
    pub fn pending(&self) -> usize {
        self.reassembler.pending()
    }

    /// Decode counters, including rejections by cause.
    pub fn reassembler_stats(&self) -> &ReassemblerStats {
        self.reassembler.stats()
    }

    /// Delivery counters: frames handed to a handler and frames nobody wanted.
    pub fn dispatch_stats(&self) -> &DispatchStats {
        self.dispatcher.stats()
    }

    /// Topics with registered handlers, in ascending order.
    pub fn topics(&self) -> Vec<Topic> {
        self.dispatcher.topics()
    }
}
