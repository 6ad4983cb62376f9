//! Event Types for the Fusion Pipeline
//!
//! ## Event Flow
//!
//! ```text
//! Producer ──DoaEvent──> Event Bus ──> Aggregator ──Window──> Triangulation
//! ```
//!
//! A [`DoaEvent`] is created once per debounce-approved detection and ends up
//! in exactly one [`Window`]. Events are small `Copy` values so they can be
//! moved across the bus without allocation.

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::geometry::normalize_degrees;
use crate::time::Timestamp;

/// Identifier of one physical sensor, 1-based and stable for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(u8);

impl SensorId {
    /// Wrap a raw id
    pub const fn new(id: u8) -> Self {
        Self(id)
    }

    /// Raw id
    pub const fn get(self) -> u8 {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u8> for SensorId {
    fn from(id: u8) -> Self {
        Self(id)
    }
}

/// One direction-of-arrival detection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "DoaEventRecord")]
pub struct DoaEvent {
    sensor: SensorId,
    angle_degrees: f64,
    timestamp: Timestamp,
}

/// Wire shape of [`DoaEvent`]; decoding goes through [`DoaEvent::new`]
#[derive(Deserialize)]
struct DoaEventRecord {
    sensor: SensorId,
    angle_degrees: f64,
    timestamp: Timestamp,
}

impl From<DoaEventRecord> for DoaEvent {
    fn from(record: DoaEventRecord) -> Self {
        DoaEvent::new(record.sensor, record.angle_degrees, record.timestamp)
    }
}

impl DoaEvent {
    /// Create an event; the angle is folded into [0, 360)
    pub fn new(sensor: SensorId, angle_degrees: f64, timestamp: Timestamp) -> Self {
        Self {
            sensor,
            angle_degrees: normalize_degrees(angle_degrees),
            timestamp,
        }
    }

    /// Reporting sensor
    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    /// Direction in the sensor's frame, degrees in [0, 360)
    pub fn angle_degrees(&self) -> f64 {
        self.angle_degrees
    }

    /// Detection time
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// `(sensor, angle)` pair consumed by triangulation
    pub fn observation(&self) -> (SensorId, f64) {
        (self.sensor, self.angle_degrees)
    }
}

/// Events grouped for one triangulation attempt, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    opened_at: Timestamp,
    deadline: Timestamp,
    events: Vec<DoaEvent>,
}

impl Window {
    /// Open a window seeded with its first event
    pub fn open(first: DoaEvent, length_ms: u64) -> Self {
        let opened_at = first.timestamp();
        Self {
            opened_at,
            deadline: opened_at.saturating_add(length_ms),
            events: vec![first],
        }
    }

    /// Append a late event
    pub fn push(&mut self, event: DoaEvent) {
        self.events.push(event);
    }

    /// Timestamp of the seeding event
    pub fn opened_at(&self) -> Timestamp {
        self.opened_at
    }

    /// Time at which the window closes
    pub fn deadline(&self) -> Timestamp {
        self.deadline
    }

    /// Whether `now` is at or past the deadline
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now >= self.deadline
    }

    /// Sensor that opened the window
    pub fn first(&self) -> &DoaEvent {
        &self.events[0]
    }

    /// Events in arrival order
    pub fn events(&self) -> &[DoaEvent] {
        &self.events
    }

    /// Number of collected events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Always false; a window is created with one event
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// `(sensor, angle)` pairs in arrival order
    pub fn observations(&self) -> Vec<(SensorId, f64)> {
        self.events.iter().map(DoaEvent::observation).collect()
    }
}
