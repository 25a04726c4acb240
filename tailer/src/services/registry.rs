//! Subscriber registry service
//!
//! Tracks connected subscribers behind a single mutex and fans each line out
//! with a non-blocking enqueue. A subscriber whose queue is full is ejected
//! rather than allowed to slow the producer or its peers.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use shared::{Component, component_debug, component_warn};

use crate::traits::SubscriberRegistry;
use crate::types::{Line, PublishOutcome, SubscriberId};

/// One-shot eject action for a subscriber
///
/// Firing it cancels the subscriber's eject signal; the subscriber's own
/// task then closes the connection with a policy-violation status.
#[derive(Clone, Debug)]
pub struct Ejector {
    signal: CancellationToken,
    fired: Arc<AtomicBool>,
}

impl Ejector {
    fn new(signal: CancellationToken) -> Self {
        Self {
            signal,
            fired: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fire the eject; `true` only for the first call
    pub fn eject(&self) -> bool {
        if self.fired.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.signal.cancel();
        true
    }

    pub fn is_ejected(&self) -> bool {
        self.fired.load(Ordering::Acquire)
    }
}

/// Registry-side view of a connected peer
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    queue: mpsc::Sender<Line>,
    ejector: Ejector,
}

impl Subscriber {
    /// Create a subscriber and the inbox its endpoint drains
    pub fn channel(capacity: usize) -> (Subscriber, SubscriberInbox) {
        let id = SubscriberId::new();
        let (queue, receiver) = mpsc::channel(capacity);
        let eject_signal = CancellationToken::new();

        let subscriber = Subscriber {
            id,
            queue,
            ejector: Ejector::new(eject_signal.clone()),
        };
        let inbox = SubscriberInbox {
            id,
            receiver,
            eject_signal,
        };
        (subscriber, inbox)
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn ejector(&self) -> &Ejector {
        &self.ejector
    }
}

/// Endpoint-side half of a subscriber: its queue and eject signal
#[derive(Debug)]
pub struct SubscriberInbox {
    id: SubscriberId,
    receiver: mpsc::Receiver<Line>,
    eject_signal: CancellationToken,
}

impl SubscriberInbox {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Next queued line; `None` once the registry side is gone
    pub async fn recv(&mut self) -> Option<Line> {
        self.receiver.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Line> {
        self.receiver.try_recv().ok()
    }

    /// Cancelled when the subscriber has been ejected
    pub fn eject_signal(&self) -> CancellationToken {
        self.eject_signal.clone()
    }

    pub fn is_ejected(&self) -> bool {
        self.eject_signal.is_cancelled()
    }
}

/// Registration held by an endpoint for the lifetime of its connection
///
/// Deregisters exactly once, either explicitly or on drop.
pub struct Subscription<R: SubscriberRegistry> {
    registry: Arc<R>,
    inbox: SubscriberInbox,
    registered: bool,
}

impl<R: SubscriberRegistry> Subscription<R> {
    /// Build a subscriber with a fresh queue and register it
    ///
    /// Returns the subscription and the subscriber total after insertion.
    pub fn register(registry: Arc<R>, capacity: usize) -> (Self, usize) {
        let (subscriber, inbox) = Subscriber::channel(capacity);
        let total = registry.add(subscriber);
        let subscription = Self {
            registry,
            inbox,
            registered: true,
        };
        (subscription, total)
    }

    pub fn id(&self) -> SubscriberId {
        self.inbox.id()
    }

    pub fn inbox(&mut self) -> &mut SubscriberInbox {
        &mut self.inbox
    }

    /// Remove from the registry; only the first call has an effect
    pub fn deregister(&mut self) -> bool {
        if !self.registered {
            return false;
        }
        self.registered = false;
        self.registry.remove(self.inbox.id())
    }
}

impl<R: SubscriberRegistry> Drop for Subscription<R> {
    fn drop(&mut self) {
        self.deregister();
    }
}

/// Real subscriber registry implementation
#[derive(Clone)]
pub struct RealSubscriberRegistry {
    /// Live subscribers keyed by id
    subscribers: Arc<Mutex<HashMap<SubscriberId, Subscriber>>>,

    /// Subscriber count, updated under the same lock as the map
    count_tx: Arc<watch::Sender<usize>>,
}

impl RealSubscriberRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        let (count_tx, _) = watch::channel(0);
        Self {
            subscribers: Arc::new(Mutex::new(HashMap::new())),
            count_tx: Arc::new(count_tx),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SubscriberId, Subscriber>> {
        self.subscribers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for RealSubscriberRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriberRegistry for RealSubscriberRegistry {
    fn add(&self, subscriber: Subscriber) -> usize {
        let id = subscriber.id;
        let mut subscribers = self.lock();
        subscribers.insert(id, subscriber);
        let total = subscribers.len();
        self.count_tx.send_replace(total);
        drop(subscribers);

        component_debug!(Component::Registry, "➕ Added subscriber {} ({} total)", id, total);
        total
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut subscribers = self.lock();
        let removed = subscribers.remove(&id).is_some();
        let total = subscribers.len();
        self.count_tx.send_replace(total);
        drop(subscribers);

        if removed {
            component_debug!(Component::Registry, "➖ Removed subscriber {} ({} total)", id, total);
        }
        removed
    }

    fn publish(&self, line: Line) -> PublishOutcome {
        let mut outcome = PublishOutcome::default();
        let mut overflowed = Vec::new();

        {
            let subscribers = self.lock();
            for subscriber in subscribers.values() {
                match subscriber.queue.try_send(line.clone()) {
                    Ok(()) => outcome.delivered += 1,
                    Err(TrySendError::Full(_)) | Err(TrySendError::Closed(_)) => {
                        overflowed.push((subscriber.id, subscriber.ejector.clone()));
                    }
                }
            }
        }

        // Ejects fire only after the lock is released.
        outcome.ejected = overflowed.len();
        for (id, ejector) in overflowed {
            if ejector.eject() {
                component_warn!(Component::Registry, "🐢 Subscriber {} too slow, ejecting", id);
            }
        }

        outcome
    }

    fn subscriber_count(&self) -> usize {
        self.lock().len()
    }

    fn watch_count(&self) -> watch::Receiver<usize> {
        self.count_tx.subscribe()
    }
}
