//! Common test utilities for integration tests
//!
//! This module provides:
//! - Scripted sensor adapters that replay a fixed sequence of readouts
//! - A recording sink shared between the test and the aggregator thread
//! - Geometry and polling helpers

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use doafuse_core::{
    geometry::normalize_degrees, DeploymentConfig, Point, PositionEstimate, SensorAdapter, SensorId,
    SensorReadError, Sink, SinkError, WindowFrame,
};

/// One scripted readout
#[derive(Debug, Clone)]
pub enum Step {
    /// Voice present, reported at this angle
    Voice(f64),
    /// No voice
    Silent,
    /// VAD readout fails
    Fail(SensorReadError),
}

/// Replays steps in order, then stays silent
#[derive(Debug, Clone, Default)]
pub struct ScriptedAdapter {
    steps: VecDeque<Step>,
}

impl ScriptedAdapter {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self { steps: steps.into_iter().collect() }
    }

    /// Speaks once at `angle`
    pub fn once(angle: f64) -> Self {
        Self::new([Step::Voice(angle)])
    }
}

impl SensorAdapter for ScriptedAdapter {
    fn has_voice(&mut self) -> Result<bool, SensorReadError> {
        match self.steps.front() {
            Some(Step::Voice(_)) => Ok(true),
            Some(Step::Silent) => {
                self.steps.pop_front();
                Ok(false)
            }
            Some(Step::Fail(e)) => {
                let e = e.clone();
                self.steps.pop_front();
                Err(e)
            }
            None => Ok(false),
        }
    }

    fn angle_degrees(&mut self) -> Result<f64, SensorReadError> {
        match self.steps.pop_front() {
            Some(Step::Voice(angle)) => Ok(angle),
            _ => Err(SensorReadError::InvalidData {
                sensor: SensorId::new(0),
                reason: "angle read without voice".into(),
            }),
        }
    }
}

/// Everything a [`RecordingSink`] saw
#[derive(Debug, Default)]
pub struct Recorded {
    pub estimates: Vec<PositionEstimate>,
    pub frames: Vec<WindowFrame>,
    pub clears: usize,
}

/// Sink whose clones share one record
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<R>(&self, f: impl FnOnce(&Recorded) -> R) -> R {
        f(&self.inner.lock().unwrap())
    }

    pub fn estimate_count(&self) -> usize {
        self.with(|r| r.estimates.len())
    }

    pub fn frame_count(&self) -> usize {
        self.with(|r| r.frames.len())
    }

    pub fn clear_count(&self) -> usize {
        self.with(|r| r.clears)
    }
}

impl Sink for RecordingSink {
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        self.inner.lock().unwrap().estimates.push(estimate.clone());
        Ok(())
    }

    fn render(&mut self, frame: &WindowFrame) -> Result<(), SinkError> {
        self.inner.lock().unwrap().frames.push(frame.clone());
        Ok(())
    }

    fn cleared(&mut self) -> Result<(), SinkError> {
        self.inner.lock().unwrap().clears += 1;
        Ok(())
    }
}

/// Angle a sensor at `origin` reports for a source at `target`
pub fn bearing_towards(origin: Point, target: Point, offset_deg: f64) -> f64 {
    let world = (target.y - origin.y).atan2(target.x - origin.x).to_degrees();
    normalize_degrees(world - offset_deg)
}

/// One scripted adapter per configured sensor, all aimed at `target`
pub fn adapters_towards(config: &DeploymentConfig, target: Point) -> Vec<(SensorId, ScriptedAdapter)> {
    config
        .sensors
        .iter()
        .map(|placement| {
            let angle = bearing_towards(placement.position(), target, config.bearing_offset_deg);
            (placement.id, ScriptedAdapter::once(angle))
        })
        .collect()
}

/// Poll `condition` every few milliseconds until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    condition()
}

pub fn assert_close(actual: Point, expected: Point, tolerance: f64) {
    assert!(
        actual.distance(&expected) <= tolerance,
        "expected ({}, {}), got ({}, {})",
        expected.x,
        expected.y,
        actual.x,
        actual.y
    );
}
