//! Change fan-out between the broker worker and the dashboard connections.
//!
//! Every accepted state change becomes a [`ChangeEvent`] that is delivered to
//! each live [`Subscription`] independently. A change event is a signal, not
//! a diff: consumers are expected to re-read a full state snapshot rather
//! than apply the event as a patch.
//!
//! ```text
//! ingestion ──► ChangeBus::publish ──► Subscription (per dashboard client)
//!                                  ──► Subscription
//!                                  ──► ...
//! ```
//!
//! Delivery rules:
//! - publishing never blocks, regardless of how slow any subscriber is
//! - each subscriber sees its own FIFO view of the events
//! - a subscriber that falls behind the ring capacity loses the oldest
//!   buffered events (logged), never the most recent
//! - dropping a [`Subscription`] deregisters it; nothing else is required

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;
use tracing::warn;

/// Default event ring capacity, shared by all subscribers.
const DEFAULT_CAPACITY: usize = 256;

/// What kind of change happened. Only updates exist today; removals are
/// folded into the snapshot the consumer re-reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Update,
}

/// Immutable record of a single accepted state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub kind: EventKind,
    pub topic: String,
    pub payload: String,
}

impl ChangeEvent {
    pub fn update(topic: impl Into<String>, payload: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Update,
            topic: topic.into(),
            payload: payload.into(),
        }
    }
}

/// Result of waiting on a [`Subscription`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusPoll {
    /// The next queued event, FIFO within this subscription.
    Event(ChangeEvent),
    /// Nothing arrived within the timeout. Used by consumers as a heartbeat
    /// signal, not an error.
    KeepAlive,
    /// The producer side is gone and the queue is drained.
    Closed,
}

/// Fan-out handle shared by the ingestion path and the gateway.
///
/// Cloning is cheap and every clone publishes into the same ring. With no
/// subscribers a publish is a no-op.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<ChangeEvent>,
}

impl ChangeBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Registers a new, empty subscription. It only observes events published
    /// after this call.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Delivers an event to every current subscription. Never blocks and
    /// never fails; a full ring drops the oldest event for the lagging
    /// subscriber only.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusively-owned receive side of the bus.
///
/// Dropping the subscription deregisters it from the bus; there is no
/// separate unsubscribe call to forget or to call twice.
#[derive(Debug)]
pub struct Subscription {
    rx: broadcast::Receiver<ChangeEvent>,
}

impl Subscription {
    /// Waits for the next event.
    ///
    /// Returns [`BusPoll::KeepAlive`] when the timeout elapses first and
    /// [`BusPoll::Closed`] once the bus is gone and the queue is drained.
    /// When this subscriber has lagged past the ring capacity the skipped
    /// count is logged and the wait continues with the oldest retained
    /// event.
    ///
    /// Cancellation safe: dropping the returned future mid-wait loses no
    /// queued event and cannot corrupt other subscriptions.
    pub async fn recv(&mut self, timeout: Duration) -> BusPoll {
        loop {
            match time::timeout(timeout, self.rx.recv()).await {
                Err(_) => return BusPoll::KeepAlive,
                Ok(Ok(event)) => return BusPoll::Event(event),
                Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                    warn!(skipped, "subscriber lagged, dropped oldest events");
                    continue;
                }
                Ok(Err(broadcast::error::RecvError::Closed)) => return BusPoll::Closed,
            }
        }
    }
}

/// Collapses consecutive identical events.
///
/// Two back-to-back events with the same kind, topic and payload trigger a
/// single re-render on the consumer side. This is a presentation
/// optimization owned by the consumer; the bus itself delivers every event.
#[derive(Debug, Default)]
pub struct DuplicateFilter {
    last: Option<ChangeEvent>,
}

impl DuplicateFilter {
    /// Returns false when `event` repeats the immediately preceding one.
    pub fn accept(&mut self, event: &ChangeEvent) -> bool {
        if self.last.as_ref() == Some(event) {
            return false;
        }
        self.last = Some(event.clone());
        true
    }
}
