//! Named-topic publish/subscribe for cross-component notifications.
//!
//! The bus is synchronous: handlers run on the publishing call, in
//! registration order. A handler that returns an error is logged and
//! never prevents sibling handlers from running. Subscribing under the
//! wildcard topic `*` receives every published event.
//!
//! # Example
//!
//! ```rust
//! use microbill::EventBus;
//! use serde_json::json;
//!
//! let bus = EventBus::new();
//! let id = bus.subscribe("team:added", |event| {
//!     println!("team added: {}", event.payload);
//!     Ok(())
//! });
//!
//! bus.publish("team:added", json!({"name": "Biologie Cellulaire"}));
//! bus.unsubscribe(id);
//! ```

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

/// Topic that receives every published event.
pub const WILDCARD_TOPIC: &str = "*";

/// A published event: the topic it was published under plus its payload.
#[derive(Debug, Clone)]
pub struct Event {
    /// Topic name, e.g. `team:added` or `storage:error`.
    pub topic: String,
    /// Arbitrary JSON payload supplied by the publisher.
    pub payload: Value,
}

/// Handle returned by a subscription, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

impl SubscriptionId {
    pub(crate) fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

type Handler = Arc<dyn Fn(&Event) -> anyhow::Result<()> + Send + Sync>;

#[derive(Default)]
struct EventBusInner {
    /// Handlers per topic, in registration order. The wildcard topic is
    /// stored under `*` like any other.
    handlers: RwLock<HashMap<String, Vec<(SubscriptionId, Handler)>>>,
}

/// Synchronous named-topic event bus.
///
/// Cloning is cheap; clones share the same subscriber table.
#[derive(Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

impl EventBus {
    /// Create a new bus with no subscribers.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to a topic. Returns a handle for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, topic: &str, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let id = SubscriptionId::new();
        let mut handlers = self.inner.handlers.write().unwrap();
        handlers
            .entry(topic.to_string())
            .or_default()
            .push((id, Arc::new(handler)));
        id
    }

    /// Subscribe to every event, regardless of topic.
    pub fn subscribe_all<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&Event) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.subscribe(WILDCARD_TOPIC, handler)
    }

    /// Remove a subscription. Returns whether it existed.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.inner.handlers.write().unwrap();
        let mut removed = false;
        for list in handlers.values_mut() {
            let before = list.len();
            list.retain(|(sub_id, _)| *sub_id != id);
            removed |= list.len() != before;
        }
        // Topics accumulate over a long session; drop emptied lists so
        // the table does not grow without bound.
        handlers.retain(|_, list| !list.is_empty());
        removed
    }

    /// Remove every subscription on the bus.
    pub fn clear(&self) {
        self.inner.handlers.write().unwrap().clear();
    }

    /// Publish an event to a topic.
    ///
    /// Topic subscribers run first, then wildcard subscribers, all on the
    /// calling thread. Handler errors are logged and isolated.
    pub fn publish(&self, topic: &str, payload: Value) {
        let event = Event {
            topic: topic.to_string(),
            payload,
        };

        // Snapshot handlers so a callback can subscribe/unsubscribe
        // without deadlocking on the table lock.
        let to_run: Vec<Handler> = {
            let handlers = self.inner.handlers.read().unwrap();
            let mut to_run = Vec::new();
            if let Some(list) = handlers.get(topic) {
                to_run.extend(list.iter().map(|(_, h)| Arc::clone(h)));
            }
            if topic != WILDCARD_TOPIC {
                if let Some(list) = handlers.get(WILDCARD_TOPIC) {
                    to_run.extend(list.iter().map(|(_, h)| Arc::clone(h)));
                }
            }
            to_run
        };

        debug!(topic = %event.topic, subscribers = to_run.len(), "publishing event");

        for handler in to_run {
            if let Err(error) = handler(&event) {
                warn!(topic = %event.topic, %error, "event handler failed");
            }
        }
    }

    /// Number of live subscriptions across all topics.
    #[must_use]
    pub fn subscription_count(&self) -> usize {
        self.inner
            .handlers
            .read()
            .unwrap()
            .values()
            .map(Vec::len)
            .sum()
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.subscription_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_publish_reaches_topic_subscriber() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        bus.subscribe("team:added", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("team:added", json!({}));
        bus.publish("team:removed", json!({}));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_wildcard_receives_every_topic() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        bus.subscribe_all(move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("a", json!(1));
        bus.publish("b", json!(2));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_handler_does_not_block_siblings() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        bus.subscribe("x", |_| anyhow::bail!("boom"));
        let hits_clone = Arc::clone(&hits);
        bus.subscribe("x", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("x", json!(null));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let hits_clone = Arc::clone(&hits);
        let id = bus.subscribe("x", move |_| {
            hits_clone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bus.publish("x", json!(null));
        assert!(bus.unsubscribe(id));
        bus.publish("x", json!(null));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(!bus.unsubscribe(id));
    }

    #[test]
    fn test_unsubscribe_drops_emptied_topic() {
        let bus = EventBus::new();
        let id = bus.subscribe("x", |_| Ok(()));
        bus.subscribe("y", |_| Ok(()));

        assert!(bus.unsubscribe(id));
        let handlers = bus.inner.handlers.read().unwrap();
        assert!(!handlers.contains_key("x"));
        assert!(handlers.contains_key("y"));
    }

    #[test]
    fn test_handlers_run_in_registration_order() {
        let bus = EventBus::new();
        let order = Arc::new(RwLock::new(Vec::new()));
        for label in ["first", "second", "third"] {
            let order_clone = Arc::clone(&order);
            bus.subscribe("x", move |_| {
                order_clone.write().unwrap().push(label);
                Ok(())
            });
        }

        bus.publish("x", json!(null));
        assert_eq!(*order.read().unwrap(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_subscribing_from_handler_does_not_deadlock() {
        let bus = EventBus::new();
        let bus_clone = bus.clone();
        bus.subscribe("x", move |_| {
            bus_clone.subscribe("y", |_| Ok(()));
            Ok(())
        });

        bus.publish("x", json!(null));
        assert_eq!(bus.subscription_count(), 2);
    }
}
