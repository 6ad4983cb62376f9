//! Ray triangulation of direction-of-arrival observations
//!
//! ## Algorithm
//!
//! Every pair of rays is intersected and the intersections averaged:
//!
//! ```text
//! for each (sensor, angle) with a known position:
//!     ray = position + t * (cos theta, sin theta),  theta = offset + angle
//! for each unordered pair (a, b):
//!     skip if |a.dir x b.dir| < 1e-6          (parallel, no information)
//!     collect a ∩ b
//! estimate = mean of collected intersections
//! ```
//!
//! The result is independent of input order up to floating point rounding.
//!
//! Fewer than two usable rays, or only parallel pairs, give no estimate. That
//! is the normal "degenerate geometry" outcome, not an error.

use std::collections::BTreeMap;

use crate::config::DeploymentConfig;
use crate::constants::PARALLEL_EPSILON;
use crate::events::SensorId;
use crate::geometry::{Point, Ray};

/// Outcome of one triangulation attempt, with the diagnostics callers log
#[derive(Debug, Clone, PartialEq)]
pub struct Triangulation {
    /// Centroid of pairwise intersections, if any
    pub estimate: Option<Point>,
    /// Rays built from observations with a known sensor position
    pub rays: Vec<Ray>,
    /// Observations dropped for an unknown sensor
    pub unknown_sensors: usize,
    /// Observations dropped for a NaN or infinite angle
    pub invalid_angles: usize,
    /// Ray pairs that intersected
    pub intersecting_pairs: usize,
    /// Ray pairs skipped as parallel
    pub parallel_pairs: usize,
}

/// Maps batches of `(sensor, angle)` observations to a position
///
/// Holds only immutable deployment data, so one instance can be shared
/// freely; [`Triangulator::triangulate`] is a pure function of its input.
#[derive(Debug, Clone)]
pub struct Triangulator {
    positions: BTreeMap<SensorId, Point>,
    bearing_offset_deg: f64,
    parallel_epsilon: f64,
}

impl Triangulator {
    /// Triangulator for explicit sensor positions
    pub fn new(positions: impl IntoIterator<Item = (SensorId, Point)>, bearing_offset_deg: f64) -> Self {
        Self {
            positions: positions.into_iter().collect(),
            bearing_offset_deg,
            parallel_epsilon: PARALLEL_EPSILON,
        }
    }

    /// Triangulator for a deployment
    pub fn from_config(config: &DeploymentConfig) -> Self {
        Self::new(
            config.sensors.iter().map(|placement| (placement.id, placement.position())),
            config.bearing_offset_deg,
        )
    }

    /// Position of `sensor`, if known
    pub fn position(&self, sensor: SensorId) -> Option<Point> {
        self.positions.get(&sensor).copied()
    }

    /// Ray for one observation, `None` for an unknown sensor or a non-finite angle
    pub fn ray(&self, sensor: SensorId, angle_degrees: f64) -> Option<Ray> {
        if !angle_degrees.is_finite() {
            return None;
        }
        self.position(sensor)
            .map(|origin| Ray::from_bearing(sensor, origin, angle_degrees, self.bearing_offset_deg))
    }

    /// Estimate a position; shorthand for `triangulate(..).estimate`
    pub fn estimate(&self, observations: &[(SensorId, f64)]) -> Option<Point> {
        self.triangulate(observations).estimate
    }

    /// Estimate a position and report how the rays behaved
    pub fn triangulate(&self, observations: &[(SensorId, f64)]) -> Triangulation {
        let rays: Vec<Ray> = observations
            .iter()
            .filter_map(|&(sensor, angle)| self.ray(sensor, angle))
            .collect();
        let invalid_angles = observations.iter().filter(|(_, angle)| !angle.is_finite()).count();
        let unknown_sensors = observations
            .iter()
            .filter(|(sensor, angle)| angle.is_finite() && self.position(*sensor).is_none())
            .count();

        let mut sum = Point::default();
        let mut intersecting_pairs = 0;
        let mut parallel_pairs = 0;

        if rays.len() >= 2 {
            for (i, a) in rays.iter().enumerate() {
                for b in &rays[i + 1..] {
                    match a.intersect(b, self.parallel_epsilon) {
                        Some(p) => {
                            sum.x += p.x;
                            sum.y += p.y;
                            intersecting_pairs += 1;
                        }
                        None => parallel_pairs += 1,
                    }
                }
            }
        }

        let estimate = (intersecting_pairs > 0).then(|| {
            let n = intersecting_pairs as f64;
            Point::new(sum.x / n, sum.y / n)
        });

        Triangulation {
            estimate,
            rays,
            unknown_sensors,
            invalid_angles,
            intersecting_pairs,
            parallel_pairs,
        }
    }
}
