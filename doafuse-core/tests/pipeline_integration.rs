//! Integration tests for the threaded pipeline
//!
//! Runs real producer and aggregator threads on the monotonic clock with
//! scripted adapters and a recording sink.

mod common;

use std::sync::Arc;
use std::time::Duration;

use doafuse_core::{DeploymentConfig, Pipeline, Point, PipelineError, SensorId, SensorReadError};

use common::{adapters_towards, assert_close, bearing_towards, wait_until, RecordingSink, ScriptedAdapter, Step};

const WAIT: Duration = Duration::from_secs(5);

#[test]
fn test_end_to_end_estimate() {
    let config = Arc::new(DeploymentConfig::default());
    let target = Point::new(0.3, -0.4);
    let sink = RecordingSink::new();

    let mut builder = Pipeline::builder(config.clone()).sink(sink.clone());
    for (id, adapter) in adapters_towards(&config, target) {
        builder = builder.sensor(id, adapter);
    }
    let handle = builder.build().unwrap().spawn().unwrap();

    // wait for a frame that has seen all four sensors, not just the first estimate
    assert!(wait_until(WAIT, || {
        sink.with(|r| r.frames.last().map_or(false, |frame| frame.latest_rays.len() == 4))
    }));
    let stats = handle.shutdown_and_join().unwrap();

    // every window holding two or more sensors points at the target
    sink.with(|recorded| {
        for estimate in &recorded.estimates {
            assert_close(estimate.position, target, 1e-6);
            assert!(!estimate.clamped);
            assert!(estimate.sensors().len() >= 2);
        }
        let last = recorded.frames.last().unwrap();
        assert_eq!(last.latest_rays.len(), 4);
        assert!(!last.history.is_empty());
    });
    assert_eq!(stats.events_received, 4);
    assert_eq!(stats.sink_errors, 0);
}

#[test]
fn test_producer_survives_adapter_errors() {
    let mut config = DeploymentConfig::default();
    config.error_backoff_ms = 5;
    let config = Arc::new(config);
    let target = Point::new(-0.5, -1.0);
    let sink = RecordingSink::new();

    let front_right = config.position(SensorId::new(1)).unwrap();
    let front_left = config.position(SensorId::new(4)).unwrap();
    let flaky = ScriptedAdapter::new([
        Step::Fail(SensorReadError::Timeout { sensor: SensorId::new(1) }),
        Step::Fail(SensorReadError::Disconnected { sensor: SensorId::new(1) }),
        Step::Voice(bearing_towards(front_right, target, config.bearing_offset_deg)),
    ]);
    let steady = ScriptedAdapter::once(bearing_towards(front_left, target, config.bearing_offset_deg));

    let handle = Pipeline::builder(config.clone())
        .sensor(1, flaky)
        .sensor(4, steady)
        .sink(sink.clone())
        .build()
        .unwrap()
        .spawn()
        .unwrap();

    let heard_flaky = || {
        sink.with(|r| {
            r.frames
                .iter()
                .any(|frame| frame.events.iter().any(|e| e.sensor() == SensorId::new(1)))
        })
    };
    assert!(wait_until(WAIT, heard_flaky));
    let stats = handle.shutdown_and_join().unwrap();
    assert_eq!(stats.events_received, 2);
}

#[test]
fn test_clear_empties_history() {
    let config = Arc::new(DeploymentConfig::default());
    let sink = RecordingSink::new();

    let mut builder = Pipeline::builder(config.clone()).sink(sink.clone());
    for (id, adapter) in adapters_towards(&config, Point::new(0.3, -0.4)) {
        builder = builder.sensor(id, adapter);
    }
    let pipeline = builder.build().unwrap();
    let clear = pipeline.clear_handle();
    let handle = pipeline.spawn().unwrap();

    assert!(wait_until(WAIT, || sink.estimate_count() > 0));
    clear.request();
    assert!(wait_until(WAIT, || sink.clear_count() == 1));
    assert!(!clear.is_pending());

    handle.shutdown_and_join().unwrap();
}

#[test]
fn test_shutdown_flushes_open_window() {
    let mut config = DeploymentConfig::default();
    config.collect_window_ms = 60_000;
    let config = Arc::new(config);
    let sink = RecordingSink::new();

    let handle = Pipeline::builder(config)
        .sensor(2, ScriptedAdapter::once(30.0))
        .sink(sink.clone())
        .build()
        .unwrap()
        .spawn()
        .unwrap();

    // the event is collected but its window is far from closing
    std::thread::sleep(Duration::from_millis(200));
    assert_eq!(sink.frame_count(), 0);

    let stats = handle.shutdown_and_join().unwrap();
    assert_eq!(stats.windows_closed, 1);
    assert_eq!(stats.degenerate_windows, 1);
    assert_eq!(sink.frame_count(), 1);
    assert_eq!(sink.estimate_count(), 0);
}

#[test]
fn test_unplaced_sensor_is_rejected() {
    let result = Pipeline::builder(Arc::new(DeploymentConfig::default()))
        .sensor(7, ScriptedAdapter::default())
        .build();
    assert!(matches!(result, Err(PipelineError::UnknownSensor(_))));
}
