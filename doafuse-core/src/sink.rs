//! Output side of the pipeline
//!
//! The aggregator hands every estimate and every completed window to a
//! [`Sink`]. Transports (MQTT, a plotting front end, a test recorder) are
//! interchangeable implementations; the aggregation and triangulation code is
//! the same for all of them.
//!
//! Sink calls run on the aggregator thread, so implementations must return
//! quickly: enqueue, don't wait on the network. Errors are logged by the
//! aggregator and never retried.

use log::info;
use serde::Serialize;

use crate::errors::SinkError;
use crate::events::DoaEvent;
use crate::history::{DisplayRay, PositionEstimate};
use crate::time::Timestamp;

/// Everything a display needs after one window closes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowFrame {
    /// Timestamp of the event that opened the window
    pub opened_at: Timestamp,
    /// Time the window was processed
    pub closed_at: Timestamp,
    /// Raw events in arrival order
    pub events: Vec<DoaEvent>,
    /// Rays built from this window's events (known sensors only)
    pub window_rays: Vec<DisplayRay>,
    /// Latest ray of every sensor seen since the last clear
    pub latest_rays: Vec<DisplayRay>,
    /// Estimate produced by this window, if any
    pub estimate: Option<PositionEstimate>,
    /// History after pruning
    pub history: Vec<PositionEstimate>,
}

/// Consumer of estimates and window frames
pub trait Sink: Send {
    /// Deliver one estimate
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError>;

    /// Deliver the state after a window; ignored by default
    fn render(&mut self, _frame: &WindowFrame) -> Result<(), SinkError> {
        Ok(())
    }

    /// History and rays were cleared; ignored by default
    fn cleared(&mut self) -> Result<(), SinkError> {
        Ok(())
    }
}

impl<S: Sink + ?Sized> Sink for Box<S> {
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        (**self).publish(estimate)
    }

    fn render(&mut self, frame: &WindowFrame) -> Result<(), SinkError> {
        (**self).render(frame)
    }

    fn cleared(&mut self) -> Result<(), SinkError> {
        (**self).cleared()
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSink;

impl Sink for NullSink {
    fn publish(&mut self, _estimate: &PositionEstimate) -> Result<(), SinkError> {
        Ok(())
    }
}

/// Writes each estimate to the log at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl Sink for LogSink {
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        info!(
            "source at ({:.2}, {:.2}) from {} detections",
            estimate.position.x,
            estimate.position.y,
            estimate.sources.len()
        );
        Ok(())
    }

    fn render(&mut self, frame: &WindowFrame) -> Result<(), SinkError> {
        info!("{} detections live, {} sensor rays", frame.history.len(), frame.latest_rays.len());
        Ok(())
    }
}

/// Forwards to several sinks in order
///
/// Every sink is called even if an earlier one fails; the first error is
/// returned.
#[derive(Default)]
pub struct FanoutSink {
    sinks: Vec<Box<dyn Sink>>,
}

impl FanoutSink {
    /// Empty fan-out
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink
    pub fn with(mut self, sink: impl Sink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }

    /// Number of sinks
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Whether no sink was added
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    fn each(&mut self, mut f: impl FnMut(&mut dyn Sink) -> Result<(), SinkError>) -> Result<(), SinkError> {
        let mut first_error = None;
        for sink in &mut self.sinks {
            if let Err(e) = f(sink.as_mut()) {
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

impl Sink for FanoutSink {
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        self.each(|sink| sink.publish(estimate))
    }

    fn render(&mut self, frame: &WindowFrame) -> Result<(), SinkError> {
        self.each(|sink| sink.render(frame))
    }

    fn cleared(&mut self) -> Result<(), SinkError> {
        self.each(|sink| sink.cleared())
    }
}
