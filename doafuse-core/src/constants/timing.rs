//! Timing Constants
//!
//! All durations are in milliseconds, matching [`Timestamp`](crate::time::Timestamp).

/// Minimum spacing between two accepted detections from one sensor.
///
/// One utterance keeps the VAD flag raised for several hundred milliseconds;
/// anything inside this interval is treated as the same utterance.
pub const VAD_IGNORE_DURATION_MS: u64 = 300;

/// Aggregation window opened by the first event of a batch.
///
/// Arrays a few meters apart report the same utterance within tens of
/// milliseconds of each other.
pub const COLLECT_WINDOW_MS: u64 = 200;

/// Age after which an estimate is dropped from the detection history.
pub const DETECTION_LIFETIME_MS: u64 = 3_000;

/// Producer pause when the adapter reports no voice.
pub const IDLE_POLL_MS: u64 = 10;

/// Producer pause after an adapter error.
pub const ERROR_BACKOFF_MS: u64 = 100;

/// Aggregator receive timeout while no window is open.
pub const IDLE_RECEIVE_TIMEOUT_MS: u64 = 1_000;
