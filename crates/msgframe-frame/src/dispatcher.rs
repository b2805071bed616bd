//! Topic-keyed handler table.

use std::collections::HashMap;

use crate::codec::{Frame, Topic};

/// Anything that can be routed by topic.
pub trait Routed {
    /// Topic used to select a handler.
    fn topic(&self) -> Topic;
}

impl Routed for Frame {
    fn topic(&self) -> Topic {
        self.topic
    }
}

/// Boxed handler invoked synchronously for each routed item.
pub type Handler<M> = Box<dyn FnMut(&M) + Send>;

/// Outcome of a single [`Dispatcher::dispatch`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// At least one handler (topic or catch-all) saw the item.
    Handled,
    /// Nobody was subscribed; the item was dropped.
    Unhandled,
}

/// Dispatch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// Items delivered to at least one handler.
    pub dispatched: u64,
    /// Items dropped for lack of a subscriber.
    pub unhandled: u64,
}

/// Maps topics to handlers. At most one handler per topic; the last
/// [`subscribe`](Self::subscribe) for a topic wins.
pub struct Dispatcher<M> {
    handlers: HashMap<Topic, Handler<M>>,
    catch_all: Option<Handler<M>>,
    stats: DispatchStats,
}

impl<M: Routed> Dispatcher<M> {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
            catch_all: None,
            stats: DispatchStats::default(),
        }
    }

    /// Register `handler` for `topic`, replacing any previous one.
    pub fn subscribe<F>(&mut self, topic: Topic, handler: F)
    where
        F: FnMut(&M) + Send + 'static,
    {
        if self.handlers.insert(topic, Box::new(handler)).is_some() {
            tracing::debug!(topic, "replaced handler");
        }
    }

    /// Remove the handler for `topic`. Returns true if one was registered.
    pub fn unsubscribe(&mut self, topic: Topic) -> bool {
        self.handlers.remove(&topic).is_some()
    }

    /// Register a handler that sees every item, before any topic handler.
    pub fn subscribe_all<F>(&mut self, handler: F)
    where
        F: FnMut(&M) + Send + 'static,
    {
        self.catch_all = Some(Box::new(handler));
    }

    /// Remove the catch-all handler.
    pub fn unsubscribe_all(&mut self) -> bool {
        self.catch_all.take().is_some()
    }

    /// Route `item` to its handlers.
    pub fn dispatch(&mut self, item: &M) -> Delivery {
        let topic = item.topic();
        let mut handled = false;

        if let Some(handler) = self.catch_all.as_mut() {
            handler(item);
            handled = true;
        }

        if let Some(handler) = self.handlers.get_mut(&topic) {
            handler(item);
            handled = true;
        }

        if handled {
            self.stats.dispatched += 1;
            Delivery::Handled
        } else {
            tracing::debug!(topic, "no handler for topic");
            self.stats.unhandled += 1;
            Delivery::Unhandled
        }
    }

    /// True if a handler is registered for `topic`.
    pub fn is_subscribed(&self, topic: Topic) -> bool {
        self.handlers.contains_key(&topic)
    }

    /// Topics with registered handlers, in ascending order.
    pub fn topics(&self) -> Vec<Topic> {
        let mut topics: Vec<Topic> = self.handlers.keys().copied().collect();
        topics.sort_unstable();
        topics
    }

    /// Dispatch counters since creation.
    pub fn stats(&self) -> &DispatchStats {
        &self.stats
    }
}

impl<M: Routed> Default for Dispatcher<M> {
    fn default() -> Self {
        Self::new()
    }
}

impl<M> std::fmt::Debug for Dispatcher<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut topics: Vec<&Topic> = self.handlers.keys().collect();
        topics.sort_unstable();
        f.debug_struct("Dispatcher")
            .field("topics", &topics)
            .field("catch_all", &self.catch_all.is_some())
            .field("stats", &self.stats)
            .finish()
    }
}
