//! Detection history and display state
//!
//! The aggregator is the only writer, so none of this is locked. Readers on
//! other threads get snapshots through the sink; the one external write,
//! "clear everything", is requested through a [`ClearHandle`] and carried out
//! by the aggregator on its own thread.
//!
//! Pruning drops every estimate older than the configured lifetime. It runs
//! once per completed window and again on every display read, so a snapshot
//! never contains an expired entry.

use std::collections::{BTreeMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;

use crate::events::{DoaEvent, SensorId};
use crate::geometry::{Point, Ray};
use crate::time::Timestamp;

/// One fused source position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionEstimate {
    /// Position clipped to the room
    pub position: Point,
    /// Centroid before clipping
    pub raw: Point,
    /// Whether clipping moved the centroid
    pub clamped: bool,
    /// Time the estimate was made
    pub timestamp: Timestamp,
    /// Events of the window that produced it
    pub sources: Vec<DoaEvent>,
}

impl PositionEstimate {
    /// Age at `now`
    pub fn age(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.timestamp)
    }

    /// Distinct sensors that contributed, ascending
    pub fn sensors(&self) -> Vec<SensorId> {
        let mut ids: Vec<SensorId> = self.sources.iter().map(DoaEvent::sensor).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Time-ordered store of recent estimates, pruned by age
#[derive(Debug, Clone)]
pub struct DetectionHistory {
    lifetime_ms: u64,
    entries: VecDeque<PositionEstimate>,
}

impl DetectionHistory {
    /// Empty history keeping entries for `lifetime_ms`
    pub fn new(lifetime_ms: u64) -> Self {
        Self { lifetime_ms, entries: VecDeque::new() }
    }

    /// Append an estimate
    pub fn push(&mut self, estimate: PositionEstimate) {
        self.entries.push_back(estimate);
    }

    /// Drop every entry with `now - timestamp > lifetime`
    ///
    /// Returns the number of entries removed.
    pub fn prune(&mut self, now: Timestamp) -> usize {
        let before = self.entries.len();
        let lifetime = self.lifetime_ms;
        self.entries.retain(|entry| entry.age(now) <= lifetime);
        before - self.entries.len()
    }

    /// Prune, then copy out what remains
    pub fn snapshot(&mut self, now: Timestamp) -> Vec<PositionEstimate> {
        self.prune(now);
        self.entries.iter().cloned().collect()
    }

    /// Most recent estimate
    pub fn latest(&self) -> Option<&PositionEstimate> {
        self.entries.back()
    }

    /// Remove everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries currently held (pruned or not)
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is held
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Configured lifetime
    pub fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }
}

/// Segment drawn from a sensor along its latest bearing
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DisplayRay {
    /// Sensor the ray belongs to
    pub sensor: SensorId,
    /// Sensor position
    pub start: Point,
    /// Far end of the segment
    pub end: Point,
    /// Reported angle in the sensor frame
    pub angle_degrees: f64,
    /// Time of the detection
    pub timestamp: Timestamp,
}

impl DisplayRay {
    /// Segment of `length` meters along `ray`
    pub fn new(ray: &Ray, length: f64, angle_degrees: f64, timestamp: Timestamp) -> Self {
        Self {
            sensor: ray.sensor,
            start: ray.origin,
            end: ray.point_at(length),
            angle_degrees,
            timestamp,
        }
    }
}

/// Latest display ray per sensor
#[derive(Debug, Clone, Default)]
pub struct RayCache {
    rays: BTreeMap<SensorId, DisplayRay>,
}

impl RayCache {
    /// Empty cache
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the sensor's previous ray
    pub fn update(&mut self, ray: DisplayRay) {
        self.rays.insert(ray.sensor, ray);
    }

    /// Latest ray of `sensor`
    pub fn get(&self, sensor: SensorId) -> Option<&DisplayRay> {
        self.rays.get(&sensor)
    }

    /// All cached rays by ascending sensor id
    pub fn rays(&self) -> Vec<DisplayRay> {
        self.rays.values().copied().collect()
    }

    /// Forget every ray
    pub fn clear(&mut self) {
        self.rays.clear();
    }

    /// Number of sensors with a ray
    pub fn len(&self) -> usize {
        self.rays.len()
    }

    /// Whether no ray is cached
    pub fn is_empty(&self) -> bool {
        self.rays.is_empty()
    }
}

/// Requests a history clear from any thread
///
/// Clones share one flag. The aggregator polls it every loop iteration and
/// empties both the history and the ray cache.
#[derive(Debug, Clone, Default)]
pub struct ClearHandle {
    requested: Arc<AtomicBool>,
}

impl ClearHandle {
    /// Handle with no pending request
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask the aggregator to clear
    pub fn request(&self) {
        self.requested.store(true, Ordering::SeqCst);
    }

    /// Consume a pending request, if any
    pub fn take(&self) -> bool {
        self.requested.swap(false, Ordering::SeqCst)
    }

    /// Whether a request is waiting
    pub fn is_pending(&self) -> bool {
        self.requested.load(Ordering::SeqCst)
    }
}
