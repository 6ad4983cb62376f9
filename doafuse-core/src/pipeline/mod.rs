//! Thread wiring for a running deployment
//!
//! ## Architecture
//!
//! ```text
//! doa-producer-1 ──┐
//! doa-producer-2 ──┼─→ event bus ─→ doa-aggregator ─→ Sink
//! doa-producer-N ──┘                      ↑
//!                                   ClearHandle
//! ```
//!
//! One thread per sensor plus one aggregator. All of them share a
//! [`ShutdownSignal`](crate::shutdown::ShutdownSignal); producers stop at
//! their next wait, the aggregator processes the window it holds and stops.
//!
//! ## Module Organization
//!
//! - Handle and lifecycle (this file)
//! - `builder` - [`Pipeline`] and [`PipelineBuilder`]
//!
//! ```no_run
//! use std::sync::Arc;
//! use doafuse_core::{DeploymentConfig, LogSink, Pipeline, SensorAdapter, SensorReadError};
//!
//! struct Silent;
//! impl SensorAdapter for Silent {
//!     fn has_voice(&mut self) -> Result<bool, SensorReadError> { Ok(false) }
//!     fn angle_degrees(&mut self) -> Result<f64, SensorReadError> { Ok(0.0) }
//! }
//!
//! let config = Arc::new(DeploymentConfig::default());
//! let handle = Pipeline::builder(config)
//!     .sensor(1, Silent)
//!     .sensor(2, Silent)
//!     .sink(LogSink)
//!     .build()?
//!     .spawn()?;
//!
//! handle.shutdown();
//! handle.join()?;
//! # Ok::<(), doafuse_core::PipelineError>(())
//! ```

use std::thread::JoinHandle;

use log::{error, info};

use crate::aggregator::AggregatorStats;
use crate::errors::PipelineError;
use crate::history::ClearHandle;
use crate::shutdown::ShutdownSignal;

mod builder;

pub use builder::{Pipeline, PipelineBuilder};

/// Thread name of the producer for `sensor`
pub(crate) fn producer_thread_name(sensor: impl std::fmt::Display) -> String {
    format!("doa-producer-{}", sensor)
}

/// Thread name of the aggregator
pub(crate) const AGGREGATOR_THREAD_NAME: &str = "doa-aggregator";

/// Control over a spawned pipeline
///
/// Dropping the handle detaches the threads; they keep running until
/// something else triggers the shutdown signal.
#[derive(Debug)]
pub struct PipelineHandle {
    shutdown: ShutdownSignal,
    clear: ClearHandle,
    producers: Vec<(String, JoinHandle<()>)>,
    aggregator: Option<(String, JoinHandle<AggregatorStats>)>,
}

impl PipelineHandle {
    pub(crate) fn new(shutdown: ShutdownSignal, clear: ClearHandle) -> Self {
        Self {
            shutdown,
            clear,
            producers: Vec::new(),
            aggregator: None,
        }
    }

    pub(crate) fn add_producer(&mut self, name: String, handle: JoinHandle<()>) {
        self.producers.push((name, handle));
    }

    pub(crate) fn set_aggregator(&mut self, name: String, handle: JoinHandle<AggregatorStats>) {
        self.aggregator = Some((name, handle));
    }

    /// Handle that clears history and rays on the aggregator thread
    pub fn clear_handle(&self) -> ClearHandle {
        self.clear.clone()
    }

    /// Shutdown signal shared by every thread
    pub fn shutdown_signal(&self) -> ShutdownSignal {
        self.shutdown.clone()
    }

    /// Ask every thread to stop; returns immediately
    pub fn shutdown(&self) {
        info!("pipeline shutdown requested");
        self.shutdown.trigger();
    }

    /// Number of producer threads
    pub fn producer_count(&self) -> usize {
        self.producers.len()
    }

    /// Wait for every thread to finish
    ///
    /// Blocks until shutdown is requested (or every producer has ended on its
    /// own). Joins all threads even if some panicked; the first panic is
    /// reported.
    pub fn join(mut self) -> Result<AggregatorStats, PipelineError> {
        let mut first_panic = None;

        for (name, handle) in self.producers.drain(..) {
            if handle.join().is_err() {
                error!("thread {} panicked", name);
                first_panic.get_or_insert(PipelineError::ThreadPanicked { name });
            }
        }

        let stats = match self.aggregator.take() {
            Some((name, handle)) => match handle.join() {
                Ok(stats) => Some(stats),
                Err(_) => {
                    error!("thread {} panicked", name);
                    first_panic.get_or_insert(PipelineError::ThreadPanicked { name });
                    None
                }
            },
            None => None,
        };

        if let Some(e) = first_panic {
            return Err(e);
        }
        info!("pipeline stopped");
        Ok(stats.unwrap_or_default())
    }

    /// [`shutdown`](Self::shutdown) followed by [`join`](Self::join)
    pub fn shutdown_and_join(self) -> Result<AggregatorStats, PipelineError> {
        self.shutdown();
        self.join()
    }
}
