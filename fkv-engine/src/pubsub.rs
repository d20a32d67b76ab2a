//! # Publish/Subscribe Broker
//!
//! Topic-keyed fan-out over bounded, per-subscriber channels.
//!
//! Delivery is best-effort: a slow subscriber whose channel is full simply
//! misses the message (`try_send`, never `send().await`) rather than
//! stalling every other subscriber on the same topic or the publisher
//! itself.
//!
//! Two behaviors here correct bugs present in the original broker this was
//! translated from:
//! - `unsubscribe` removes the exact sink that was handed out, not merely
//!   whichever sink happens to occupy that slot once the topic empties.
//! - `publish` takes the topic table's lock exactly once per call, rather
//!   than once to look up the topic and again to iterate its sinks.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use hashbrown::HashMap;
use parking_lot::RwLock;
use tokio::sync::mpsc;

/// Outstanding messages a single subscriber may buffer before new
/// publishes start being dropped for it.
pub const SUBSCRIBER_CAPACITY: usize = 100;

/// Opaque identifier for a single subscription, returned by
/// [`Broker::subscribe`] and required by [`Broker::unsubscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving half of a subscription; yields published payloads in order.
pub type Subscription = mpsc::Receiver<Bytes>;

struct Sink {
    id: SubscriptionId,
    tx: mpsc::Sender<Bytes>,
}

/// Topic-keyed publish/subscribe broker.
pub struct Broker {
    topics: RwLock<HashMap<String, Vec<Sink>>>,
    next_id: AtomicU64,
}

impl Default for Broker {
    fn default() -> Self {
        Self::new()
    }
}

impl Broker {
    pub fn new() -> Self {
        Broker {
            topics: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a new subscriber on `topic`, returning its id and the
    /// receiving half of its channel.
    pub fn subscribe(&self, topic: &str) -> (SubscriptionId, Subscription) {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);

        let mut topics = self.topics.write();
        topics.entry(topic.to_string()).or_default().push(Sink { id, tx });

        (id, rx)
    }

    /// Removes exactly the sink identified by `id` from `topic`.
    ///
    /// Drops the topic entry entirely once its sink list is empty, but
    /// never touches any sink other than the one named by `id`.
    pub fn unsubscribe(&self, topic: &str, id: SubscriptionId) {
        let mut topics = self.topics.write();
        if let Some(sinks) = topics.get_mut(topic) {
            sinks.retain(|sink| sink.id != id);
            if sinks.is_empty() {
                topics.remove(topic);
            }
        }
    }

    /// Delivers `payload` to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers the payload was handed to
    /// (accepted into their channel, not necessarily yet read). A
    /// subscriber whose channel is full is silently skipped.
    pub fn publish(&self, topic: &str, payload: Bytes) -> usize {
        let topics = self.topics.read();
        let Some(sinks) = topics.get(topic) else {
            return 0;
        };

        let mut delivered = 0;
        for sink in sinks {
            if sink.tx.try_send(payload.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of subscribers currently registered on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics.read().get(topic).map_or(0, Vec::len)
    }
}
