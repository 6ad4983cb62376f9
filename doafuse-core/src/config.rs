//! Deployment configuration
//!
//! One [`DeploymentConfig`] describes a room: where each sensor sits, the room
//! rectangle, and the pipeline timings. It is loaded once at startup, validated,
//! wrapped in an `Arc` and handed to every component. Nothing reads
//! configuration from globals.
//!
//! ## File format
//!
//! JSON; every field is optional and falls back to the reference room.
//!
//! ```json
//! {
//!   "sensors": [
//!     { "id": 1, "x": 1.25, "y": 0.25 },
//!     { "id": 2, "x": -1.25, "y": 0.25 }
//!   ],
//!   "room": { "x_min": -1.9, "x_max": 1.9, "y_min": -6.95, "y_max": 1.35 },
//!   "collect_window_ms": 200,
//!   "bearing_offset_deg": 180.0
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{
    BEARING_OFFSET_DEG, COLLECT_WINDOW_MS, DETECTION_LIFETIME_MS, ERROR_BACKOFF_MS,
    IDLE_POLL_MS, IDLE_RECEIVE_TIMEOUT_MS, RAY_LENGTH_M, REFERENCE_SENSOR_POSITIONS,
    VAD_IGNORE_DURATION_MS,
};
use crate::errors::{ConfigError, ConfigResult};
use crate::events::SensorId;
use crate::geometry::{Point, RoomBounds};

/// Fixed position of one sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensorPlacement {
    /// Sensor id
    pub id: SensorId,
    /// East coordinate (meters)
    pub x: f64,
    /// North coordinate (meters)
    pub y: f64,
}

impl SensorPlacement {
    /// Placement of sensor `id` at `(x, y)`
    pub fn new(id: impl Into<SensorId>, x: f64, y: f64) -> Self {
        Self { id: id.into(), x, y }
    }

    /// Position as a point
    pub fn position(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// Everything a pipeline needs to know about its deployment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Sensor layout
    pub sensors: Vec<SensorPlacement>,
    /// Room rectangle estimates are clipped to
    pub room: RoomBounds,
    /// Debounce interval per sensor
    pub vad_ignore_duration_ms: u64,
    /// Aggregation window length
    pub collect_window_ms: u64,
    /// Age after which estimates leave the history
    pub detection_lifetime_ms: u64,
    /// Mounting calibration added to every angle
    pub bearing_offset_deg: f64,
    /// Length of display rays
    pub ray_length_m: f64,
    /// Producer idle pause
    pub idle_poll_ms: u64,
    /// Producer pause after an adapter error
    pub error_backoff_ms: u64,
    /// Aggregator receive timeout with no open window
    pub idle_receive_timeout_ms: u64,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            sensors: REFERENCE_SENSOR_POSITIONS
                .iter()
                .map(|&(id, x, y)| SensorPlacement::new(id, x, y))
                .collect(),
            room: RoomBounds::default(),
            vad_ignore_duration_ms: VAD_IGNORE_DURATION_MS,
            collect_window_ms: COLLECT_WINDOW_MS,
            detection_lifetime_ms: DETECTION_LIFETIME_MS,
            bearing_offset_deg: BEARING_OFFSET_DEG,
            ray_length_m: RAY_LENGTH_M,
            idle_poll_ms: IDLE_POLL_MS,
            error_backoff_ms: ERROR_BACKOFF_MS,
            idle_receive_timeout_ms: IDLE_RECEIVE_TIMEOUT_MS,
        }
    }
}

impl DeploymentConfig {
    /// Parse and validate a JSON document
    pub fn from_json_str(json: &str) -> ConfigResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Serialize to pretty JSON
    pub fn to_json_string(&self) -> ConfigResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace the sensor layout
    pub fn with_sensors(mut self, sensors: impl IntoIterator<Item = SensorPlacement>) -> Self {
        self.sensors = sensors.into_iter().collect();
        self
    }

    /// Replace the room rectangle
    pub fn with_room(mut self, room: RoomBounds) -> Self {
        self.room = room;
        self
    }

    /// Position of `sensor`, if configured
    pub fn position(&self, sensor: SensorId) -> Option<Point> {
        self.sensors
            .iter()
            .find(|placement| placement.id == sensor)
            .map(SensorPlacement::position)
    }

    /// Configured sensor ids, in configuration order
    pub fn sensor_ids(&self) -> impl Iterator<Item = SensorId> + '_ {
        self.sensors.iter().map(|placement| placement.id)
    }

    /// Check every invariant the pipeline relies on
    pub fn validate(&self) -> ConfigResult<()> {
        if self.sensors.is_empty() {
            return Err(ConfigError::NoSensors);
        }

        for (idx, placement) in self.sensors.iter().enumerate() {
            if placement.id.get() == 0 {
                return Err(ConfigError::ZeroSensorId);
            }
            if !placement.position().is_finite() {
                return Err(ConfigError::NonFinite { field: "sensors" });
            }
            if self.sensors[..idx].iter().any(|other| other.id == placement.id) {
                return Err(ConfigError::DuplicateSensor(placement.id));
            }
        }

        let room = &self.room;
        for (field, value) in [
            ("room.x_min", room.x_min),
            ("room.x_max", room.x_max),
            ("room.y_min", room.y_min),
            ("room.y_max", room.y_max),
            ("bearing_offset_deg", self.bearing_offset_deg),
            ("ray_length_m", self.ray_length_m),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field });
            }
        }
        if room.x_min > room.x_max {
            return Err(ConfigError::InvertedBounds { axis: "x", min: room.x_min, max: room.x_max });
        }
        if room.y_min > room.y_max {
            return Err(ConfigError::InvertedBounds { axis: "y", min: room.y_min, max: room.y_max });
        }

        for (field, value) in [
            ("collect_window_ms", self.collect_window_ms),
            ("idle_poll_ms", self.idle_poll_ms),
            ("error_backoff_ms", self.error_backoff_ms),
            ("idle_receive_timeout_ms", self.idle_receive_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::ZeroDuration { field });
            }
        }

        Ok(())
    }
}
