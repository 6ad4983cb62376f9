//! Per-sensor producer loop
//!
//! Each physical sensor gets one producer thread. The producer polls the
//! sensor's voice-activity flag, debounces it into discrete detections and
//! pushes them onto the event bus:
//!
//! ```text
//!            ┌──────── no voice ────────> idle_poll ──┐
//! poll VAD ──┼── voice, debounced ───────> idle_poll ──┼──> poll VAD
//!            ├── voice, accepted ─> emit > vad_ignore ─┤
//!            └── adapter error ──────────> backoff ────┘
//! ```
//!
//! Adapter errors are logged and retried after a backoff; they never end the
//! loop. Only the shutdown signal (or a bus with no consumer left) does.

use std::time::Duration;

use log::{debug, info, warn};

use crate::bus::EventSender;
use crate::config::DeploymentConfig;
use crate::errors::SensorReadError;
use crate::events::{DoaEvent, SensorId};
use crate::shutdown::ShutdownSignal;
use crate::time::{millis, Timestamp, TimeSource};

/// Voice-activity and direction readouts of one sensor
///
/// Implemented by hardware drivers outside this crate. Both calls may fail
/// transiently; the producer backs off and retries.
pub trait SensorAdapter: Send {
    /// Whether speech is present right now
    fn has_voice(&mut self) -> Result<bool, SensorReadError>;

    /// Direction of arrival in the sensor frame, degrees
    fn angle_degrees(&mut self) -> Result<f64, SensorReadError>;
}

impl<A: SensorAdapter + ?Sized> SensorAdapter for Box<A> {
    fn has_voice(&mut self) -> Result<bool, SensorReadError> {
        (**self).has_voice()
    }

    fn angle_degrees(&mut self) -> Result<f64, SensorReadError> {
        (**self).angle_degrees()
    }
}

impl<A: SensorAdapter + ?Sized> SensorAdapter for &mut A {
    fn has_voice(&mut self) -> Result<bool, SensorReadError> {
        (**self).has_voice()
    }

    fn angle_degrees(&mut self) -> Result<f64, SensorReadError> {
        (**self).angle_degrees()
    }
}

/// Suppresses repeated detections within one utterance
#[derive(Debug, Clone)]
pub struct Debouncer {
    ignore_ms: u64,
    last_accepted: Option<Timestamp>,
}

impl Debouncer {
    /// Debouncer with the given minimum spacing
    pub fn new(ignore_ms: u64) -> Self {
        Self { ignore_ms, last_accepted: None }
    }

    /// Whether a detection at `now` would be accepted
    pub fn is_ready(&self, now: Timestamp) -> bool {
        match self.last_accepted {
            None => true,
            Some(last) => now.saturating_sub(last) >= self.ignore_ms,
        }
    }

    /// Record an accepted detection
    pub fn accept(&mut self, now: Timestamp) {
        self.last_accepted = Some(now);
    }

    /// Time of the last accepted detection
    pub fn last_accepted(&self) -> Option<Timestamp> {
        self.last_accepted
    }
}

/// Result of one poll of the adapter
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    /// Voice present and accepted; event pushed to the bus
    Emitted(DoaEvent),
    /// Voice present but inside the debounce interval
    Debounced,
    /// No voice
    Silent,
    /// Adapter failed
    AdapterError(SensorReadError),
    /// Event built but nobody is listening any more
    BusClosed,
}

/// Polls one adapter and feeds the event bus
pub struct SensorProducer<A, C> {
    sensor: SensorId,
    adapter: A,
    clock: C,
    debouncer: Debouncer,
    vad_ignore: Duration,
    idle_poll: Duration,
    error_backoff: Duration,
}

impl<A: SensorAdapter, C: TimeSource> SensorProducer<A, C> {
    /// Producer for `sensor` using the deployment timings
    pub fn new(sensor: SensorId, adapter: A, clock: C, config: &DeploymentConfig) -> Self {
        Self {
            sensor,
            adapter,
            clock,
            debouncer: Debouncer::new(config.vad_ignore_duration_ms),
            vad_ignore: millis(config.vad_ignore_duration_ms),
            idle_poll: millis(config.idle_poll_ms),
            error_backoff: millis(config.error_backoff_ms),
        }
    }

    /// Sensor this producer serves
    pub fn sensor(&self) -> SensorId {
        self.sensor
    }

    /// Poll the adapter once and emit at most one event
    pub fn poll_once(&mut self, bus: &EventSender) -> PollOutcome {
        match self.adapter.has_voice() {
            Ok(false) => return PollOutcome::Silent,
            Ok(true) => {}
            Err(e) => return PollOutcome::AdapterError(e),
        }

        let now = self.clock.now();
        if !self.debouncer.is_ready(now) {
            return PollOutcome::Debounced;
        }

        let angle = match self.adapter.angle_degrees() {
            Ok(angle) if angle.is_finite() => angle,
            Ok(angle) => {
                return PollOutcome::AdapterError(SensorReadError::InvalidData {
                    sensor: self.sensor,
                    reason: format!("non-finite angle {}", angle),
                })
            }
            Err(e) => return PollOutcome::AdapterError(e),
        };

        let event = DoaEvent::new(self.sensor, angle, now);
        self.debouncer.accept(now);

        if bus.send(event) {
            PollOutcome::Emitted(event)
        } else {
            PollOutcome::BusClosed
        }
    }

    /// How long to pause after `outcome`
    pub fn pause_after(&self, outcome: &PollOutcome) -> Duration {
        match outcome {
            PollOutcome::Emitted(_) => self.vad_ignore,
            PollOutcome::AdapterError(_) => self.error_backoff,
            PollOutcome::Debounced | PollOutcome::Silent | PollOutcome::BusClosed => self.idle_poll,
        }
    }

    /// Run until shutdown is requested or the bus closes
    pub fn run(mut self, bus: EventSender, shutdown: ShutdownSignal) {
        info!("sensor {}: producer started", self.sensor);

        while !shutdown.is_triggered() {
            let outcome = self.poll_once(&bus);
            match &outcome {
                PollOutcome::Emitted(event) => {
                    debug!("sensor {}: voice at {:.1} deg", self.sensor, event.angle_degrees());
                }
                PollOutcome::Debounced => {
                    debug!("sensor {}: detection inside debounce interval dropped", self.sensor);
                }
                PollOutcome::AdapterError(e) => {
                    warn!("sensor {}: {}", self.sensor, e);
                }
                PollOutcome::BusClosed => {
                    info!("sensor {}: event bus closed", self.sensor);
                    break;
                }
                PollOutcome::Silent => {}
            }

            if shutdown.wait(self.pause_after(&outcome)) {
                break;
            }
        }

        info!("sensor {}: producer stopped", self.sensor);
    }
}
