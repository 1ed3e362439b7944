//! Transport side of the queue: hands emitted messages to live subscribers.
//!
//! Uses DashMap for the subscriber registry and one bounded flume channel
//! per subscriber, so a slow reader loses messages instead of stalling the
//! drainer or the other subscribers.

use dashmap::DashMap;
use flume::TrySendError;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::error::TempoError;
use crate::core::message::Message;
use crate::core::queue::BroadcastQueue;
use crate::core::subscriber::{SubscriberId, Subscription};
use crate::metrics;

/// Receiver of emitted messages.
pub trait BroadcastSink: Send + Sync {
    /// Delivers one emitted message, returning how many subscribers got it.
    fn deliver(&self, message: &Message) -> usize;

    /// Number of currently connected subscribers.
    fn subscriber_count(&self) -> usize;
}

#[derive(Debug)]
pub struct FanoutSink {
    subscribers: DashMap<SubscriberId, flume::Sender<Message>>,
    max_subscribers: usize,
    channel_capacity: usize,
    // serializes membership changes and the count pushed to `queue`
    registration: Mutex<()>,
    /// Queue whose subscriber snapshot follows this registry.
    queue: Option<Arc<BroadcastQueue>>,
}

impl FanoutSink {
    pub fn new(max_subscribers: usize, channel_capacity: usize) -> Result<Self, TempoError> {
        if max_subscribers == 0 || channel_capacity == 0 {
            return Err(TempoError::InvalidConfig(
                "fan-out needs at least one subscriber slot and one channel slot".into(),
            ));
        }
        Ok(Self {
            subscribers: DashMap::with_capacity(max_subscribers),
            max_subscribers,
            channel_capacity,
            registration: Mutex::new(()),
            queue: None,
        })
    }

    /// Makes this sink the owner of `queue`'s subscriber count. The queue's
    /// initial hint stands until the first membership change. The queue is
    /// reset whenever the last subscriber leaves, explicitly or by dropping
    /// its `Subscription`.
    pub fn bound_to(mut self, queue: Arc<BroadcastQueue>) -> Self {
        self.queue = Some(queue);
        self
    }

    #[inline]
    pub fn max_subscribers(&self) -> usize {
        self.max_subscribers
    }

    /// Registers a new subscriber with a fresh bounded channel.
    pub fn subscribe(&self) -> Result<Subscription, TempoError> {
        self.subscribe_as(SubscriberId::generate())
    }

    /// Registers a subscriber under a caller-chosen id, replacing any
    /// previous registration with the same id.
    pub fn subscribe_as(&self, id: SubscriberId) -> Result<Subscription, TempoError> {
        let _guard = self.registration.lock();
        if !self.subscribers.contains_key(&id) && self.subscribers.len() >= self.max_subscribers {
            warn!(
                target: "tempocast::sink",
                subscriber_id = %id,
                max = self.max_subscribers,
                "rejecting subscriber: limit reached"
            );
            return Err(TempoError::SubscriberLimit {
                max: self.max_subscribers,
            });
        }

        let (tx, rx) = flume::bounded(self.channel_capacity);
        self.subscribers.insert(id.clone(), tx);
        self.membership_changed(false);
        info!(target: "tempocast::sink", subscriber_id = %id, "subscriber connected");
        Ok(Subscription::new(id, rx))
    }

    pub fn unsubscribe(&self, id: &SubscriberId) -> Result<(), TempoError> {
        let _guard = self.registration.lock();
        match self.subscribers.remove(id) {
            Some(_) => {
                self.membership_changed(true);
                info!(target: "tempocast::sink", subscriber_id = %id, "subscriber disconnected");
                Ok(())
            }
            None => Err(TempoError::UnknownSubscriber(id.clone())),
        }
    }

    pub fn is_subscribed(&self, id: &SubscriberId) -> bool {
        self.subscribers.contains_key(id)
    }

    fn prune(&self, gone: Vec<SubscriberId>) {
        if gone.is_empty() {
            return;
        }
        let _guard = self.registration.lock();
        let mut removed = false;
        for id in gone {
            if self.subscribers.remove(&id).is_some() {
                removed = true;
                debug!(target: "tempocast::sink", subscriber_id = %id, "pruned closed subscriber");
            }
        }
        if removed {
            self.membership_changed(true);
        }
    }

    // Caller holds `registration`.
    fn membership_changed(&self, removed: bool) {
        let count = self.subscribers.len();
        metrics::set_subscribers(count as u64);
        let Some(queue) = &self.queue else {
            return;
        };
        queue.set_subscriber_count(clamp_count(count));
        if removed && count == 0 {
            debug!(target: "tempocast::sink", "last subscriber left; resetting queue");
            queue.reset();
        }
    }
}

fn clamp_count(count: usize) -> u32 {
    u32::try_from(count).unwrap_or(u32::MAX)
}

impl BroadcastSink for FanoutSink {
    fn deliver(&self, message: &Message) -> usize {
        let mut delivered = 0usize;
        let mut gone = Vec::new();

        for entry in self.subscribers.iter() {
            match entry.value().try_send(message.clone()) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    metrics::inc_dropped_slow_subscriber(1);
                    debug!(
                        target: "tempocast::sink",
                        subscriber_id = %entry.key(),
                        "subscriber channel full; message skipped"
                    );
                }
                Err(TrySendError::Disconnected(_)) => gone.push(entry.key().clone()),
            }
        }

        // removal must happen after the iterator releases its shard locks
        self.prune(gone);
        metrics::inc_delivered(delivered as u64);
        delivered
    }

    fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
