//! Error Types for the Fusion Pipeline
//!
//! ## Error Categories
//!
//! Nothing in the pipeline is process-fatal. Errors are grouped by who
//! handles them:
//!
//! ### Recovered in place
//! - [`SensorReadError`]: adapter hiccup; the producer logs it, backs off and
//!   polls again
//! - [`SinkError`]: publish or render failure; the aggregator logs it and moves
//!   on to the next window
//!
//! ### Returned to the caller
//! - [`ConfigError`]: the deployment description is unusable; raised once at
//!   startup before any thread exists
//! - [`PipelineError`]: a worker thread could not be spawned or panicked
//!
//! Degenerate geometry (fewer than two usable rays, or only parallel rays) is
//! not an error at all: triangulation simply yields no estimate.
//!
//! ```rust
//! use doafuse_core::{DeploymentConfig, ConfigError};
//!
//! match DeploymentConfig::from_json_str(r#"{"collect_window_ms": 0}"#) {
//!     Err(ConfigError::ZeroDuration { field }) => assert_eq!(field, "collect_window_ms"),
//!     other => panic!("unexpected: {:?}", other),
//! }
//! ```

use thiserror::Error;

use crate::events::SensorId;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Invalid deployment configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No sensor positions configured
    #[error("no sensor positions configured")]
    NoSensors,

    /// Sensor ids are 1-based
    #[error("sensor id 0 is reserved")]
    ZeroSensorId,

    /// Same id listed twice
    #[error("sensor {0} configured more than once")]
    DuplicateSensor(SensorId),

    /// Coordinate or parameter is NaN or infinite
    #[error("{field} is not a finite number")]
    NonFinite {
        /// Offending field name
        field: &'static str,
    },

    /// Room rectangle with min above max
    #[error("room bounds inverted on {axis} axis: min {min} > max {max}")]
    InvertedBounds {
        /// `"x"` or `"y"`
        axis: &'static str,
        /// Configured minimum
        min: f64,
        /// Configured maximum
        max: f64,
    },

    /// A duration that must be positive is zero
    #[error("{field} must be greater than zero")]
    ZeroDuration {
        /// Offending field name
        field: &'static str,
    },

    /// Config file could not be read
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// Config document is not valid JSON for this schema
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Transient failure reading from a sensor adapter
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SensorReadError {
    /// Device did not answer in time
    #[error("sensor {sensor} timed out")]
    Timeout {
        /// Sensor being polled
        sensor: SensorId,
    },

    /// Device answered with something unusable
    #[error("sensor {sensor} returned invalid data: {reason}")]
    InvalidData {
        /// Sensor being polled
        sensor: SensorId,
        /// Adapter-specific description
        reason: String,
    },

    /// Device went away (USB unplugged, driver reset)
    #[error("sensor {sensor} disconnected")]
    Disconnected {
        /// Sensor being polled
        sensor: SensorId,
    },
}

/// Failure delivering an estimate or frame to a sink
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SinkError {
    /// Transport not currently usable
    #[error("sink unavailable: {0}")]
    Unavailable(String),

    /// Transport rejected the message
    #[error("publish failed: {0}")]
    Publish(String),

    /// Display refresh failed
    #[error("render failed: {0}")]
    Render(String),
}

/// Failure starting or stopping the pipeline threads
#[derive(Error, Debug)]
pub enum PipelineError {
    /// OS refused to spawn a worker
    #[error("failed to spawn {name}: {source}")]
    Spawn {
        /// Thread name
        name: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A worker panicked before join
    #[error("thread {name} panicked")]
    ThreadPanicked {
        /// Thread name
        name: String,
    },

    /// Pipeline built without sensors
    #[error("pipeline has no sensor producers")]
    NoProducers,

    /// Producer registered for a sensor the deployment does not place
    #[error("no position configured for sensor {0}")]
    UnknownSensor(SensorId),

    /// Two producers registered for one sensor
    #[error("sensor {0} has more than one producer")]
    DuplicateProducer(SensorId),

    /// Deployment configuration rejected
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
}
