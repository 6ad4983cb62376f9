//! Room Geometry Constants
//!
//! Reference deployment: four ReSpeaker-style arrays on a 2.5 m x 1.9 m
//! rectangle inside a 3.8 m wide room.
//!
//! ```text
//!   y
//!   ^      (-1.25, 0.25) #4 ---------- #1 (1.25, 0.25)
//!   |                    |              |
//!   |                    |              |
//!   |     (-1.25,-1.65) #3 ---------- #2 (1.25,-1.65)
//!   +-----------------------------------------------> x
//! ```

/// Sensor id and (x, y) position in meters for the reference room.
pub const REFERENCE_SENSOR_POSITIONS: [(u8, f64, f64); 4] = [
    (1, 1.25, 0.25),
    (2, 1.25, -1.65),
    (3, -1.25, -1.65),
    (4, -1.25, 0.25),
];

/// Room bounds (meters).
pub const ROOM_X_MIN: f64 = -1.9;
/// Room bounds (meters).
pub const ROOM_X_MAX: f64 = 1.9;
/// Room bounds (meters).
pub const ROOM_Y_MIN: f64 = -6.95;
/// Room bounds (meters).
pub const ROOM_Y_MAX: f64 = 1.35;

/// Mounting calibration added to every reported angle.
///
/// With 180 the room frame reads: north = 270, east = 180, south = 90, west = 0.
pub const BEARING_OFFSET_DEG: f64 = 180.0;

/// Length of the per-sensor display ray (meters).
pub const RAY_LENGTH_M: f64 = 2.0;

/// Ray pairs whose direction cross product is below this are parallel.
pub const PARALLEL_EPSILON: f64 = 1e-6;
