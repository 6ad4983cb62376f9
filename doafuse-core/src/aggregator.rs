//! Window aggregator: the single consumer of the event bus
//!
//! ## State machine
//!
//! ```text
//!                event (t0 = event.timestamp)
//!     ┌──────┐ ─────────────────────────────> ┌────────────┐
//!     │ Idle │                                │ Collecting │ ── event, now < deadline ──┐
//!     └──────┘ <───────────────────────────── └────────────┘ <──────────────────────────┘
//!                now >= t0 + window:
//!                triangulate, clip, store, prune, publish, render
//! ```
//!
//! An event that arrives after the deadline first closes the open window and
//! then opens a new one with itself as the seed. Events from the same sensor
//! inside one window are all kept.
//!
//! [`WindowCollector`] is the bare state machine, driven by explicit
//! timestamps. [`Aggregator`] wires it to the bus, the clock, the detection
//! history and the sink, and owns the receive loop.

use std::sync::Arc;
use std::time::Duration;

use log::{debug, info, warn};

use crate::bus::{EventReceiver, Received};
use crate::config::DeploymentConfig;
use crate::events::{DoaEvent, Window};
use crate::history::{ClearHandle, DetectionHistory, DisplayRay, PositionEstimate, RayCache};
use crate::shutdown::ShutdownSignal;
use crate::sink::{Sink, WindowFrame};
use crate::time::{millis, Timestamp, TimeSource};
use crate::triangulation::Triangulator;

/// Idle/Collecting state machine over explicit timestamps
#[derive(Debug, Clone)]
pub struct WindowCollector {
    window_ms: u64,
    open: Option<Window>,
}

impl WindowCollector {
    /// Collector producing windows of `window_ms`
    pub fn new(window_ms: u64) -> Self {
        Self { window_ms, open: None }
    }

    /// Whether a window is open
    pub fn is_collecting(&self) -> bool {
        self.open.is_some()
    }

    /// Deadline of the open window
    pub fn deadline(&self) -> Option<Timestamp> {
        self.open.as_ref().map(Window::deadline)
    }

    /// Feed an event received at `now`
    ///
    /// Returns the previous window if this arrival found it expired.
    pub fn on_event(&mut self, event: DoaEvent, now: Timestamp) -> Option<Window> {
        let closed = self.poll(now);
        match &mut self.open {
            Some(window) => window.push(event),
            None => self.open = Some(Window::open(event, self.window_ms)),
        }
        closed
    }

    /// Close and return the open window if its deadline has passed
    pub fn poll(&mut self, now: Timestamp) -> Option<Window> {
        if self.open.as_ref().is_some_and(|window| window.is_expired(now)) {
            self.open.take()
        } else {
            None
        }
    }

    /// Close the open window regardless of its deadline
    pub fn flush(&mut self) -> Option<Window> {
        self.open.take()
    }

    /// How long the consumer may block waiting for the next event
    ///
    /// Never longer than `idle`, so shutdown is noticed even while a long
    /// window is open.
    pub fn receive_timeout(&self, now: Timestamp, idle: Duration) -> Duration {
        match self.deadline() {
            Some(deadline) => millis(deadline.saturating_sub(now)).min(idle),
            None => idle,
        }
    }
}

/// Counters kept by the aggregator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AggregatorStats {
    /// Events taken off the bus
    pub events_received: u64,
    /// Windows closed
    pub windows_closed: u64,
    /// Windows that produced an estimate
    pub estimates: u64,
    /// Windows with too few or only parallel rays
    pub degenerate_windows: u64,
    /// Estimates moved by room clipping
    pub clamped_estimates: u64,
    /// Failed sink calls
    pub sink_errors: u64,
    /// Clear requests carried out
    pub clears: u64,
}

/// Drives windows through triangulation into history and the sink
pub struct Aggregator<S, C> {
    config: Arc<DeploymentConfig>,
    triangulator: Triangulator,
    collector: WindowCollector,
    history: DetectionHistory,
    rays: RayCache,
    sink: S,
    clock: C,
    clear: ClearHandle,
    stats: AggregatorStats,
}

impl<S: Sink, C: TimeSource> Aggregator<S, C> {
    /// Aggregator for a deployment
    ///
    /// `config` is taken as given; run [`DeploymentConfig::validate`] first
    /// (the pipeline builder does) or estimates may pin to a wall.
    pub fn new(config: Arc<DeploymentConfig>, sink: S, clock: C) -> Self {
        Self {
            triangulator: Triangulator::from_config(&config),
            collector: WindowCollector::new(config.collect_window_ms),
            history: DetectionHistory::new(config.detection_lifetime_ms),
            rays: RayCache::new(),
            sink,
            clock,
            clear: ClearHandle::new(),
            stats: AggregatorStats::default(),
            config,
        }
    }

    /// Use an existing clear handle instead of a fresh one
    pub fn with_clear_handle(mut self, clear: ClearHandle) -> Self {
        self.clear = clear;
        self
    }

    /// Handle that requests a clear from another thread
    pub fn clear_handle(&self) -> ClearHandle {
        self.clear.clone()
    }

    /// Detection history as currently held
    pub fn history(&self) -> &DetectionHistory {
        &self.history
    }

    /// Latest display ray per sensor
    pub fn rays(&self) -> &RayCache {
        &self.rays
    }

    /// Counters
    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    /// Sink, for inspection
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Read-for-display: prune, then copy the history
    pub fn display_snapshot(&mut self) -> Vec<PositionEstimate> {
        let now = self.clock.now();
        self.history.snapshot(now)
    }

    /// Accept one event from the bus
    pub fn handle_event(&mut self, event: DoaEvent) {
        self.stats.events_received += 1;
        let now = self.clock.now();
        if let Some(window) = self.collector.on_event(event, now) {
            self.process_window(window, now);
        }
        if let Some(deadline) = self.collector.deadline() {
            debug!(
                "sensor {} at {:.1} deg collected, window closes at {}",
                event.sensor(),
                event.angle_degrees(),
                deadline
            );
        }
    }

    /// Close the open window if its deadline has passed
    ///
    /// Returns `true` if a window was processed.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now();
        match self.collector.poll(now) {
            Some(window) => {
                self.process_window(window, now);
                true
            }
            None => false,
        }
    }

    /// Carry out a pending clear request
    ///
    /// Returns `true` if one was pending.
    pub fn apply_clear(&mut self) -> bool {
        if !self.clear.take() {
            return false;
        }

        self.history.clear();
        self.rays.clear();
        self.stats.clears += 1;
        info!("detection history and sensor rays cleared");

        if let Err(e) = self.sink.cleared() {
            self.stats.sink_errors += 1;
            warn!("sink failed to handle clear: {}", e);
        }
        true
    }

    /// Triangulate a completed window and push the outcome downstream
    pub fn process_window(&mut self, window: Window, now: Timestamp) -> Option<PositionEstimate> {
        self.stats.windows_closed += 1;
        let first = window.first();
        info!(
            "window opened by sensor {} ({:.1} deg): {} detections",
            first.sensor(),
            first.angle_degrees(),
            window.len()
        );

        let result = self.triangulator.triangulate(&window.observations());
        let estimate = match result.estimate {
            Some(raw) => {
                let (position, clamped) = self.config.room.clip(raw);
                info!(
                    "estimated source at ({:.2}, {:.2}), in room ({:.2}, {:.2})",
                    raw.x, raw.y, position.x, position.y
                );
                if clamped {
                    self.stats.clamped_estimates += 1;
                    debug!("clamped to room: ({:.2}, {:.2})", position.x, position.y);
                }
                self.stats.estimates += 1;

                let estimate = PositionEstimate {
                    position,
                    raw,
                    clamped,
                    timestamp: now,
                    sources: window.events().to_vec(),
                };
                self.history.push(estimate.clone());
                Some(estimate)
            }
            None => {
                self.stats.degenerate_windows += 1;
                info!(
                    "no estimate: {} usable rays, {} parallel pairs, {} unknown sensors, {} invalid angles",
                    result.rays.len(),
                    result.parallel_pairs,
                    result.unknown_sensors,
                    result.invalid_angles
                );
                None
            }
        };

        let pruned = self.history.prune(now);
        if pruned > 0 {
            debug!("{} expired detections pruned", pruned);
        }

        let window_rays = self.display_rays(window.events());
        for ray in &window_rays {
            self.rays.update(*ray);
        }

        if let Some(estimate) = &estimate {
            if let Err(e) = self.sink.publish(estimate) {
                self.stats.sink_errors += 1;
                warn!("failed to publish estimate: {}", e);
            }
        }

        let frame = WindowFrame {
            opened_at: window.opened_at(),
            closed_at: now,
            events: window.events().to_vec(),
            window_rays,
            latest_rays: self.rays.rays(),
            estimate: estimate.clone(),
            history: self.history.snapshot(now),
        };
        if let Err(e) = self.sink.render(&frame) {
            self.stats.sink_errors += 1;
            warn!("failed to render window: {}", e);
        }

        estimate
    }

    fn display_rays(&self, events: &[DoaEvent]) -> Vec<DisplayRay> {
        events
            .iter()
            .filter_map(|event| {
                self.triangulator
                    .ray(event.sensor(), event.angle_degrees())
                    .map(|ray| DisplayRay::new(&ray, self.config.ray_length_m, event.angle_degrees(), event.timestamp()))
            })
            .collect()
    }

    /// Consume the bus until shutdown or until every producer is gone
    ///
    /// A window still open at exit is processed immediately. Returns the
    /// final counters.
    pub fn run(mut self, bus: EventReceiver, shutdown: ShutdownSignal) -> AggregatorStats {
        let idle = millis(self.config.idle_receive_timeout_ms);
        info!("aggregator started");

        loop {
            self.apply_clear();
            if shutdown.is_triggered() {
                break;
            }
            if self.tick() {
                continue;
            }

            let timeout = self.collector.receive_timeout(self.clock.now(), idle);
            match bus.recv_timeout(timeout) {
                Received::Event(event) => self.handle_event(event),
                Received::Timeout => {}
                Received::Disconnected => {
                    info!("all producers gone");
                    break;
                }
            }
        }

        if let Some(window) = self.collector.flush() {
            let now = self.clock.now();
            self.process_window(window, now);
        }

        info!(
            "aggregator stopped: {} windows, {} estimates",
            self.stats.windows_closed, self.stats.estimates
        );
        self.stats
    }
}
