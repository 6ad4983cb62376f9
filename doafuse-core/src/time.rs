//! Time management for the fusion pipeline
//!
//! Every component reads time through [`TimeSource`] so tests can drive the
//! aggregator and debouncer with a hand-held clock:
//! - [`MonotonicClock`] for live runs (milliseconds since the clock was created)
//! - [`ManualClock`] for deterministic tests

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Timestamp in milliseconds since the clock origin
pub type Timestamp = u64;

/// Source of time for the pipeline
///
/// Shared between producer threads and the aggregator, so implementations
/// must be `Send + Sync`. Readings from one source must never go backwards.
pub trait TimeSource: Send + Sync {
    /// Get current timestamp in milliseconds
    fn now(&self) -> Timestamp;
}

impl<T: TimeSource + ?Sized> TimeSource for Arc<T> {
    fn now(&self) -> Timestamp {
        (**self).now()
    }
}

/// Monotonic time source backed by [`Instant`]
///
/// Starts at 0 when created. Clones share the same origin.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Clock whose zero is "now"
    pub fn new() -> Self {
        Self { origin: Instant::now() }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicClock {
    fn now(&self) -> Timestamp {
        self.origin.elapsed().as_millis() as Timestamp
    }
}

/// Manually advanced time source for testing
///
/// Clones share the same counter, so a test can hold one handle while the
/// pipeline reads another.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    /// Clock frozen at `start`
    pub fn new(start: Timestamp) -> Self {
        Self { now_ms: Arc::new(AtomicU64::new(start)) }
    }

    /// Jump to an absolute time
    pub fn set(&self, timestamp: Timestamp) {
        self.now_ms.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `ms`
    pub fn advance(&self, ms: u64) {
        self.now_ms.fetch_add(ms, Ordering::SeqCst);
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> Timestamp {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// Milliseconds as a [`Duration`]
pub(crate) fn millis(ms: u64) -> Duration {
    Duration::from_millis(ms)
}
