//! Planar geometry for ray triangulation
//!
//! Room frame is meters, x to the east and y to the north. Angles reported by
//! a sensor are turned into room-frame directions with a mounting offset:
//!
//! ```text
//! theta = (offset + angle) mod 360
//! direction = (cos theta, sin theta)
//! ```

use serde::{Deserialize, Serialize};

use crate::events::SensorId;

/// Point in the room frame (meters)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    /// East coordinate
    pub x: f64,
    /// North coordinate
    pub y: f64,
}

impl Point {
    /// Create a point
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance
    pub fn distance(&self, other: &Point) -> f64 {
        libm::hypot(self.x - other.x, self.y - other.y)
    }

    /// Both coordinates finite
    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Fold any angle into [0, 360)
pub fn normalize_degrees(angle: f64) -> f64 {
    let folded = angle.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs
    if folded >= 360.0 { 0.0 } else { folded }
}

/// Half-line anchored at a sensor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Sensor the ray belongs to
    pub sensor: SensorId,
    /// Sensor position
    pub origin: Point,
    /// Unit direction vector
    pub direction: (f64, f64),
}

impl Ray {
    /// Ray for a sensor reading `angle_degrees` with the given mounting offset
    pub fn from_bearing(sensor: SensorId, origin: Point, angle_degrees: f64, offset_degrees: f64) -> Self {
        let theta = normalize_degrees(offset_degrees + angle_degrees).to_radians();
        Self {
            sensor,
            origin,
            direction: (libm::cos(theta), libm::sin(theta)),
        }
    }

    /// 2-D cross product of the two directions
    pub fn cross(&self, other: &Ray) -> f64 {
        self.direction.0 * other.direction.1 - self.direction.1 * other.direction.0
    }

    /// Intersection of the two supporting lines
    ///
    /// Returns `None` when `|cross| < epsilon`. The intersection may lie
    /// "behind" either sensor; the supporting lines are intersected, not the
    /// half-lines.
    pub fn intersect(&self, other: &Ray, epsilon: f64) -> Option<Point> {
        let cross = self.cross(other);
        if cross.abs() < epsilon {
            return None;
        }

        let dx = other.origin.x - self.origin.x;
        let dy = other.origin.y - self.origin.y;
        let t = (dx * other.direction.1 - dy * other.direction.0) / cross;

        Some(Point::new(
            self.origin.x + t * self.direction.0,
            self.origin.y + t * self.direction.1,
        ))
    }

    /// Point `length` meters along the ray
    pub fn point_at(&self, length: f64) -> Point {
        Point::new(
            self.origin.x + length * self.direction.0,
            self.origin.y + length * self.direction.1,
        )
    }
}

/// Axis-aligned room rectangle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RoomBounds {
    /// West wall
    pub x_min: f64,
    /// East wall
    pub x_max: f64,
    /// South wall
    pub y_min: f64,
    /// North wall
    pub y_max: f64,
}

impl RoomBounds {
    /// Rectangle from its walls
    pub const fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self { x_min, x_max, y_min, y_max }
    }

    /// Whether `point` is inside or on the boundary
    pub fn contains(&self, point: &Point) -> bool {
        (self.x_min..=self.x_max).contains(&point.x) && (self.y_min..=self.y_max).contains(&point.y)
    }

    /// Clamp each coordinate to the walls
    ///
    /// Returns the clamped point and whether anything moved. Never panics,
    /// even for inverted or NaN bounds; a NaN coordinate lands on a wall.
    pub fn clip(&self, point: Point) -> (Point, bool) {
        let clipped = Point::new(
            point.x.max(self.x_min).min(self.x_max),
            point.y.max(self.y_min).min(self.y_max),
        );
        (clipped, clipped != point)
    }
}

impl Default for RoomBounds {
    fn default() -> Self {
        use crate::constants::{ROOM_X_MAX, ROOM_X_MIN, ROOM_Y_MAX, ROOM_Y_MIN};
        Self::new(ROOM_X_MIN, ROOM_X_MAX, ROOM_Y_MIN, ROOM_Y_MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PARALLEL_EPSILON;

    const EPS: f64 = 1e-9;

    #[test]
    fn normalize_wraps() {
        assert_eq!(normalize_degrees(0.0), 0.0);
        assert!((normalize_degrees(540.0) - 180.0).abs() < EPS);
        assert!((normalize_degrees(-1e-20)).abs() < EPS);
        assert!(normalize_degrees(-1e-20) < 360.0);
    }

    #[test]
    fn bearing_offset_rotates_frame() {
        // angle 0 with offset 180 points west
        let ray = Ray::from_bearing(SensorId::new(1), Point::default(), 0.0, 180.0);
        assert!((ray.direction.0 + 1.0).abs() < EPS);
        assert!(ray.direction.1.abs() < EPS);

        // angle 90 with offset 180 points south
        let ray = Ray::from_bearing(SensorId::new(1), Point::default(), 90.0, 180.0);
        assert!(ray.direction.0.abs() < EPS);
        assert!((ray.direction.1 + 1.0).abs() < EPS);
    }

    #[test]
    fn perpendicular_rays_intersect() {
        let a = Ray::from_bearing(SensorId::new(1), Point::new(1.0, 0.0), 0.0, 180.0);
        let b = Ray::from_bearing(SensorId::new(2), Point::new(0.0, 1.0), 90.0, 180.0);
        let p = a.intersect(&b, PARALLEL_EPSILON).unwrap();
        assert!(p.x.abs() < EPS);
        assert!(p.y.abs() < EPS);
    }

    #[test]
    fn parallel_rays_do_not_intersect() {
        let a = Ray::from_bearing(SensorId::new(1), Point::new(0.0, 0.0), 30.0, 180.0);
        let b = Ray::from_bearing(SensorId::new(2), Point::new(0.0, 1.0), 30.0, 180.0);
        assert!(a.intersect(&b, PARALLEL_EPSILON).is_none());

        let opposite = Ray::from_bearing(SensorId::new(3), Point::new(5.0, 0.0), 210.0, 180.0);
        assert!(a.intersect(&opposite, PARALLEL_EPSILON).is_none());
    }

    #[test]
    fn clip_tolerates_unvalidated_bounds() {
        let inverted = RoomBounds::new(1.0, -1.0, 0.0, 1.0);
        let (point, moved) = inverted.clip(Point::new(0.0, 0.5));
        assert!(point.x.is_finite() && point.y.is_finite());
        assert!(moved);

        let nan_wall = RoomBounds::new(f64::NAN, 1.0, -1.0, 1.0);
        let (point, _) = nan_wall.clip(Point::new(3.0, 0.0));
        assert_eq!(point, Point::new(1.0, 0.0));

        let room = RoomBounds::default();
        let (point, moved) = room.clip(Point::new(f64::NAN, 0.0));
        assert!(room.contains(&point));
        assert!(moved);
    }

    #[test]
    fn clip_reports_movement() {
        let bounds = RoomBounds::new(-1.0, 1.0, -2.0, 2.0);

        let (p, moved) = bounds.clip(Point::new(0.5, -0.5));
        assert_eq!(p, Point::new(0.5, -0.5));
        assert!(!moved);

        let (p, moved) = bounds.clip(Point::new(3.0, -7.0));
        assert_eq!(p, Point::new(1.0, -2.0));
        assert!(moved);
        assert!(bounds.contains(&p));
    }

    #[test]
    fn point_at_length() {
        let ray = Ray::from_bearing(SensorId::new(1), Point::new(1.25, 0.25), 0.0, 180.0);
        let end = ray.point_at(2.0);
        assert!((end.x - -0.75).abs() < EPS);
        assert!((end.y - 0.25).abs() < EPS);
    }
}
