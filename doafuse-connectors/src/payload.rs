//! Wire encodings for position estimates
//!
//! | Format        | Example payload                                                        |
//! |---------------|------------------------------------------------------------------------|
//! | `centimeters` | `123,-56`                                                              |
//! | `json`        | `{"x":1.234,"y":-0.567,"timestamp_ms":4200,"clamped":false,"sensors":[1,4]}` |
//!
//! Centimeter values are the clipped position in meters times 100, truncated
//! toward zero.

use doafuse_core::{Point, PositionEstimate, Timestamp};
use serde::{Deserialize, Serialize};

use crate::ConnectorError;

/// Payload encoding used by a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PayloadFormat {
    /// `"<x_cm>,<y_cm>"`
    #[default]
    Centimeters,
    /// JSON object with position, timestamp, clamping and sensors
    Json,
}

#[derive(Serialize)]
struct JsonPayload {
    x: f64,
    y: f64,
    timestamp_ms: Timestamp,
    clamped: bool,
    sensors: Vec<u8>,
}

/// `"<x_cm>,<y_cm>"` for a position in meters
pub fn centimeters(point: Point) -> String {
    format!("{},{}", (point.x * 100.0) as i64, (point.y * 100.0) as i64)
}

/// Encode `estimate` in `format`
pub fn encode(estimate: &PositionEstimate, format: PayloadFormat) -> Result<Vec<u8>, ConnectorError> {
    match format {
        PayloadFormat::Centimeters => Ok(centimeters(estimate.position).into_bytes()),
        PayloadFormat::Json => {
            let payload = JsonPayload {
                x: estimate.position.x,
                y: estimate.position.y,
                timestamp_ms: estimate.timestamp,
                clamped: estimate.clamped,
                sensors: estimate.sensors().iter().map(|s| s.get()).collect(),
            };
            Ok(serde_json::to_vec(&payload)?)
        }
    }
}
