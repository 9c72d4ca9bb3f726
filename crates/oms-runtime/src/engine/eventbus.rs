//! EventBus - fan-out of model events.
//!
//! The model publishes [`ModelEvent`]s through the [`EventSink`] trait;
//! [`EventBus`] is the runtime's sink. It forwards every event to all
//! current subscribers over a tokio broadcast channel.
//!
//! ```text
//! ┌─────────────┐  publish   ┌──────────┐  broadcast  ┌──────────────┐
//! │  Container  │ ─────────► │ EventBus │ ──────────► │ subscriber 1 │
//! │  Model      │            │          │ ──────────► │ subscriber 2 │
//! └─────────────┘            └──────────┘             └──────────────┘
//! ```
//!
//! # Delivery
//!
//! - Publishing never blocks and never fails; an event published with no
//!   subscriber is dropped (logged at trace level).
//! - A subscriber that falls more than the channel capacity behind
//!   observes `RecvError::Lagged` and skips ahead.
//! - Events published from one tree mutation arrive in publication order.

use oms_model::{EventSink, ModelEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::broadcast;

/// Default broadcast capacity.
pub const DEFAULT_CAPACITY: usize = 256;

/// Broadcasts model events to subscribers.
pub struct EventBus {
    tx: broadcast::Sender<ModelEvent>,
    published: AtomicU64,
}

impl EventBus {
    /// Creates a bus with [`DEFAULT_CAPACITY`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates a bus buffering up to `capacity` events per subscriber.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self {
            tx,
            published: AtomicU64::new(0),
        }
    }

    /// Subscribes to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ModelEvent> {
        self.tx.subscribe()
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Total number of events published.
    #[must_use]
    pub fn published(&self) -> u64 {
        self.published.load(Ordering::Relaxed)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for EventBus {
    fn publish(&self, event: ModelEvent) {
        self.published.fetch_add(1, Ordering::Relaxed);
        let kind = event.kind();
        let node = event.node();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(kind, %node, receivers, "event published");
            }
            Err(_) => {
                tracing::trace!(kind, %node, "event dropped: no subscribers");
            }
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("subscribers", &self.subscriber_count())
            .field("published", &self.published())
            .finish()
    }
}
