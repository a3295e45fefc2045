//! Topic name to listener fan-out
//!
//! Listeners are held weakly: whoever registered a listener keeps it alive,
//! and a listener dropped without deregistering simply stops receiving.

use crate::listener::{isolate, TopicListener};
use parking_lot::RwLock;
use rosbridge_protocol::Document;
use std::collections::HashMap;
use std::sync::{Arc, Weak};

/// Ordered listener lists per topic
#[derive(Default)]
pub struct TopicSubscriptionRegistry {
    topics: RwLock<HashMap<String, Vec<Weak<dyn TopicListener>>>>,
}

impl TopicSubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `listener` to the topic's list
    ///
    /// Registering the same listener twice delivers each message to it twice.
    pub fn register(&self, topic: &str, listener: &Arc<dyn TopicListener>) {
        self.topics
            .write()
            .entry(topic.to_owned())
            .or_default()
            .push(Arc::downgrade(listener));
    }

    /// Removes one registration of `listener`
    ///
    /// Returns `false` if the listener was not registered for the topic. The
    /// topic entry is removed once its last listener is gone.
    pub fn deregister(&self, topic: &str, listener: &Arc<dyn TopicListener>) -> bool {
        let mut topics = self.topics.write();
        let Some(listeners) = topics.get_mut(topic) else {
            return false;
        };

        let target = Arc::as_ptr(listener);
        let Some(index) = listeners
            .iter()
            .position(|weak| std::ptr::addr_eq(weak.as_ptr(), target))
        else {
            return false;
        };

        listeners.remove(index);
        if listeners.is_empty() {
            topics.remove(topic);
        }
        true
    }

    /// Delivers `message` to every live listener of `topic` in registration
    /// order; returns how many listeners were invoked
    pub fn dispatch(&self, topic: &str, message: &Document) -> usize {
        let (listeners, stale) = {
            let topics = self.topics.read();
            let Some(registered) = topics.get(topic) else {
                return 0;
            };
            let listeners: Vec<_> = registered.iter().filter_map(Weak::upgrade).collect();
            let stale = listeners.len() != registered.len();
            (listeners, stale)
        };

        if stale {
            self.prune(topic);
        }

        for listener in &listeners {
            isolate(topic, || listener.handle_message(message));
        }
        listeners.len()
    }

    pub fn contains(&self, topic: &str) -> bool {
        self.topics.read().contains_key(topic)
    }

    /// Number of registrations for `topic`, including ones not yet pruned
    pub fn listener_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }

    pub fn topics(&self) -> Vec<String> {
        self.topics.read().keys().cloned().collect()
    }

    fn prune(&self, topic: &str) {
        let mut topics = self.topics.write();
        if let Some(listeners) = topics.get_mut(topic) {
            listeners.retain(|weak| weak.strong_count() > 0);
            if listeners.is_empty() {
                topics.remove(topic);
            }
        }
        tracing::debug!(topic, "Pruned dropped topic listeners");
    }
}
