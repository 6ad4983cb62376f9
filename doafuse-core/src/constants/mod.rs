//! Constants for doafuse core
//!
//! Default values for a deployment. Every constant here is only a default:
//! the live values come from [`DeploymentConfig`](crate::config::DeploymentConfig),
//! which is built once at startup and passed to every component.
//!
//! ## Organization
//!
//! - **Timing**: debounce, window, lifetime and poll intervals (milliseconds)
//! - **Room**: reference sensor layout, room bounds and ray geometry

/// Debounce, aggregation and polling intervals.
pub mod timing;

/// Reference room layout and triangulation geometry.
pub mod room;

pub use timing::{
    VAD_IGNORE_DURATION_MS, COLLECT_WINDOW_MS, DETECTION_LIFETIME_MS,
    IDLE_POLL_MS, ERROR_BACKOFF_MS, IDLE_RECEIVE_TIMEOUT_MS,
};

pub use room::{
    REFERENCE_SENSOR_POSITIONS, ROOM_X_MIN, ROOM_X_MAX, ROOM_Y_MIN, ROOM_Y_MAX,
    BEARING_OFFSET_DEG, RAY_LENGTH_M, PARALLEL_EPSILON,
};
