// SPDX-FileCopyrightText: 2026 Beacon Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Internal typed event bus for the Beacon routing engine.
//!
//! Publishing never blocks and never fails: events go to whoever is
//! subscribed at that moment, and a lagging subscriber loses the oldest
//! events rather than slowing the publisher down.

pub mod events;

use tokio::sync::broadcast;
use tracing::trace;

pub use events::{BusEvent, EventKind};

/// Default number of events buffered per subscriber.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Fan-out channel for engine events. Cheap to clone.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<BusEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publish an event. Returns the number of subscribers that received it.
    pub fn publish(&self, kind: EventKind) -> usize {
        let event = BusEvent::new(kind);
        let topic = event.kind.topic();
        let delivered = self.tx.send(event).unwrap_or(0);
        trace!(topic, delivered, "event published");
        delivered
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}
