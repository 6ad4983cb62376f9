//! Property tests for triangulation, clipping, pruning and windowing

mod common;

use proptest::prelude::*;

use doafuse_core::{
    DeploymentConfig, DetectionHistory, DoaEvent, Point, PositionEstimate, RoomBounds, SensorId, Triangulator,
    WindowCollector,
};

use common::{assert_close, bearing_towards};

fn triangulator() -> Triangulator {
    Triangulator::from_config(&DeploymentConfig::default())
}

fn estimate_at(timestamp: u64) -> PositionEstimate {
    PositionEstimate {
        position: Point::new(0.0, 0.0),
        raw: Point::new(0.0, 0.0),
        clamped: false,
        timestamp,
        sources: Vec::new(),
    }
}

fn distance_to_line(point: Point, a: Point, b: Point) -> f64 {
    let (dx, dy) = (b.x - a.x, b.y - a.y);
    ((point.x - a.x) * dy - (point.y - a.y) * dx).abs() / a.distance(&b)
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-4 + 1e-6 * a.abs().max(b.abs())
}

proptest! {
    #[test]
    fn prop_triangulation_is_order_invariant(
        raw in prop::collection::vec((1u8..=4, 0.0f64..360.0), 0..8),
        rotation in 0usize..8,
    ) {
        let tri = triangulator();
        let observations: Vec<(SensorId, f64)> = raw.iter().map(|&(id, a)| (SensorId::new(id), a)).collect();

        let mut reordered = observations.clone();
        reordered.reverse();
        if !reordered.is_empty() {
            let k = rotation % reordered.len();
            reordered.rotate_left(k);
        }

        match (tri.estimate(&observations), tri.estimate(&reordered)) {
            (None, None) => {}
            (Some(a), Some(b)) => {
                prop_assert!(close(a.x, b.x), "x differs: {} vs {}", a.x, b.x);
                prop_assert!(close(a.y, b.y), "y differs: {} vs {}", a.y, b.y);
            }
            (a, b) => prop_assert!(false, "only one ordering produced an estimate: {:?} vs {:?}", a, b),
        }
    }

    #[test]
    fn prop_exact_bearings_recover_target(
        x in -1.8f64..1.8,
        y in -6.0f64..1.2,
    ) {
        let config = DeploymentConfig::default();
        let target = Point::new(x, y);
        let positions: Vec<Point> = config.sensors.iter().map(|p| p.position()).collect();

        // a target on the line through two sensors makes that pair collinear
        let clear_of_sensor_lines = positions.iter().enumerate().all(|(i, p)| {
            positions[i + 1..].iter().all(|q| distance_to_line(target, *p, *q) > 0.05)
        });
        prop_assume!(clear_of_sensor_lines);

        let observations: Vec<(SensorId, f64)> = config
            .sensors
            .iter()
            .map(|p| (p.id, bearing_towards(p.position(), target, config.bearing_offset_deg)))
            .collect();
        let estimate = triangulator().estimate(&observations);
        prop_assert!(estimate.is_some());
        let estimate = estimate.unwrap_or_default();
        prop_assert!(estimate.distance(&target) < 1e-6);
    }

    #[test]
    fn prop_clipping_is_idempotent(x in -1e3f64..1e3, y in -1e3f64..1e3) {
        let room = RoomBounds::default();
        let (once, _) = room.clip(Point::new(x, y));
        let (twice, moved) = room.clip(once);

        prop_assert_eq!(once, twice);
        prop_assert!(!moved);
        prop_assert!(room.contains(&once));
    }

    #[test]
    fn prop_prune_removes_exactly_expired(
        mut timestamps in prop::collection::vec(0u64..10_000, 0..32),
        now in 0u64..20_000,
        lifetime in 0u64..5_000,
    ) {
        timestamps.sort_unstable();
        let mut history = DetectionHistory::new(lifetime);
        for &t in &timestamps {
            history.push(estimate_at(t));
        }

        let expected: Vec<u64> = timestamps
            .iter()
            .copied()
            .filter(|&t| now.saturating_sub(t) <= lifetime)
            .collect();
        let removed = history.prune(now);
        let kept: Vec<u64> = history.snapshot(now).iter().map(|e| e.timestamp).collect();

        prop_assert_eq!(removed, timestamps.len() - expected.len());
        prop_assert_eq!(kept, expected);
    }

    #[test]
    fn prop_windows_respect_deadline(
        gaps in prop::collection::vec(0u64..400, 1..40),
        window_ms in 1u64..500,
    ) {
        let mut collector = WindowCollector::new(window_ms);
        let mut windows = Vec::new();
        let mut now = 0u64;
        for (i, gap) in gaps.iter().enumerate() {
            now += gap;
            let event = DoaEvent::new(SensorId::new((i % 4) as u8 + 1), 0.0, now);
            if let Some(window) = collector.on_event(event, now) {
                windows.push(window);
            }
        }
        windows.extend(collector.flush());

        let total: usize = windows.iter().map(|w| w.len()).sum();
        prop_assert_eq!(total, gaps.len());
        for pair in windows.windows(2) {
            prop_assert!(pair[1].opened_at() >= pair[0].deadline());
        }
        for window in &windows {
            for event in window.events() {
                prop_assert!(event.timestamp() < window.deadline());
            }
        }
    }
}

#[test]
fn test_reference_room_pair() {
    // front-right and front-left arrays, rays at 45 degrees meeting below them
    let estimate = triangulator()
        .estimate(&[(SensorId::new(1), 45.0), (SensorId::new(4), 135.0)])
        .unwrap();
    assert_close(estimate, Point::new(0.0, -1.0), 1e-6);
}
