//! Core fusion engine for doafuse
//!
//! Fuses direction-of-arrival readings from several fixed microphone arrays
//! into a single source position inside a bounded room.
//!
//! Data flow:
//! - one producer thread per sensor debounces voice activity into
//!   [`DoaEvent`]s and pushes them onto the event bus
//! - the aggregator groups events that arrive within a short window
//! - each window is triangulated from pairwise ray intersections, clipped to
//!   the room and stored in a time-pruned [`DetectionHistory`]
//! - estimates and window frames go to a [`Sink`]
//!
//! ```no_run
//! use doafuse_core::{DeploymentConfig, Triangulator, SensorId};
//!
//! let config = DeploymentConfig::default();
//! let triangulator = Triangulator::from_config(&config);
//!
//! // front-right and front-left arrays both hear a source between them
//! let estimate = triangulator.estimate(&[(SensorId::new(1), 45.0), (SensorId::new(4), 135.0)]);
//! if let Some(point) = estimate {
//!     let (clipped, _) = config.room.clip(point);
//!     println!("source at ({:.2}, {:.2})", clipped.x, clipped.y);
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod aggregator;
pub mod bus;
pub mod config;
pub mod constants;
pub mod errors;
pub mod events;
pub mod geometry;
pub mod history;
pub mod pipeline;
pub mod producer;
pub mod shutdown;
pub mod sink;
pub mod time;
pub mod triangulation;

// Public API
pub use aggregator::{Aggregator, AggregatorStats, WindowCollector};
pub use bus::{event_bus, EventReceiver, EventSender, Received};
pub use config::{DeploymentConfig, SensorPlacement};
pub use errors::{ConfigError, ConfigResult, PipelineError, SensorReadError, SinkError};
pub use events::{DoaEvent, SensorId, Window};
pub use geometry::{Point, Ray, RoomBounds};
pub use history::{ClearHandle, DetectionHistory, DisplayRay, PositionEstimate, RayCache};
pub use pipeline::{Pipeline, PipelineBuilder, PipelineHandle};
pub use producer::{Debouncer, PollOutcome, SensorAdapter, SensorProducer};
pub use shutdown::ShutdownSignal;
pub use sink::{FanoutSink, LogSink, NullSink, Sink, WindowFrame};
pub use time::{ManualClock, MonotonicClock, TimeSource, Timestamp};
pub use triangulation::{Triangulation, Triangulator};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
