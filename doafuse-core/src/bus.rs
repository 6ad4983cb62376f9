//! Event bus between sensor producers and the aggregator
//!
//! Multi-producer, single-consumer and unbounded: a producer never blocks on
//! `send`, the consumer waits with a timeout. Ordering is FIFO per producer
//! only; window membership does not depend on cross-sensor order.
//!
//! ```text
//! Producer 1 ──┐
//! Producer 2 ──┼─→ EventSender ═══ unbounded ═══> EventReceiver ─→ Aggregator
//! Producer N ──┘
//! ```

use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};

use crate::events::DoaEvent;

/// Create a connected sender/receiver pair
pub fn event_bus() -> (EventSender, EventReceiver) {
    let (tx, rx) = crossbeam_channel::unbounded();
    (EventSender { inner: tx }, EventReceiver { inner: rx })
}

/// Producer side of the bus; cheap to clone, one per producer
#[derive(Debug, Clone)]
pub struct EventSender {
    inner: Sender<DoaEvent>,
}

impl EventSender {
    /// Enqueue an event without blocking
    ///
    /// Returns `false` once the receiver is gone.
    pub fn send(&self, event: DoaEvent) -> bool {
        self.inner.send(event).is_ok()
    }
}

/// What a timed receive produced
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Received {
    /// An event arrived
    Event(DoaEvent),
    /// Nothing arrived within the timeout
    Timeout,
    /// Every sender has been dropped and the queue is drained
    Disconnected,
}

/// Consumer side of the bus
#[derive(Debug)]
pub struct EventReceiver {
    inner: Receiver<DoaEvent>,
}

impl EventReceiver {
    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Received {
        match self.inner.recv_timeout(timeout) {
            Ok(event) => Received::Event(event),
            Err(RecvTimeoutError::Timeout) => Received::Timeout,
            Err(RecvTimeoutError::Disconnected) => Received::Disconnected,
        }
    }

    /// Take the next event if one is already queued
    pub fn try_recv(&self) -> Option<DoaEvent> {
        self.inner.try_recv().ok()
    }

    /// Events currently queued
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the queue is empty
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}
