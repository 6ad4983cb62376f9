//! Pipeline builder and thread spawning
//!
//! The builder collects one adapter per sensor, a clock and a sink. `build`
//! checks the set against the deployment; `spawn` starts the threads.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread;

use log::{error, info};

use crate::aggregator::Aggregator;
use crate::bus::event_bus;
use crate::config::DeploymentConfig;
use crate::errors::PipelineError;
use crate::events::SensorId;
use crate::history::ClearHandle;
use crate::producer::{SensorAdapter, SensorProducer};
use crate::shutdown::ShutdownSignal;
use crate::sink::{NullSink, Sink};
use crate::time::{MonotonicClock, TimeSource};

use super::{producer_thread_name, PipelineHandle, AGGREGATOR_THREAD_NAME};

/// A validated, not yet running pipeline
pub struct Pipeline<C = MonotonicClock> {
    config: Arc<DeploymentConfig>,
    adapters: Vec<(SensorId, Box<dyn SensorAdapter>)>,
    sink: Box<dyn Sink>,
    clock: C,
    clear: ClearHandle,
    shutdown: ShutdownSignal,
}

impl Pipeline {
    /// Start building a pipeline for `config`
    pub fn builder(config: Arc<DeploymentConfig>) -> PipelineBuilder {
        PipelineBuilder::new(config)
    }
}

impl<C: TimeSource + Clone + 'static> Pipeline<C> {
    /// Clear handle usable before and after spawning
    pub fn clear_handle(&self) -> ClearHandle {
        self.clear.clone()
    }

    /// Sensors that will get a producer, in registration order
    pub fn sensors(&self) -> Vec<SensorId> {
        self.adapters.iter().map(|(id, _)| *id).collect()
    }

    /// Start one producer thread per sensor and the aggregator thread
    ///
    /// If any thread fails to start, the ones already running are stopped and
    /// joined before the error is returned.
    pub fn spawn(self) -> Result<PipelineHandle, PipelineError> {
        let Pipeline { config, adapters, sink, clock, clear, shutdown } = self;
        let (tx, rx) = event_bus();
        let mut handle = PipelineHandle::new(shutdown.clone(), clear.clone());

        for (sensor, adapter) in adapters {
            let name = producer_thread_name(sensor);
            let producer = SensorProducer::new(sensor, adapter, clock.clone(), &config);
            let bus = tx.clone();
            let stop = shutdown.clone();

            match thread::Builder::new()
                .name(name.clone())
                .spawn(move || producer.run(bus, stop))
            {
                Ok(join) => handle.add_producer(name, join),
                Err(source) => return Err(abort(handle, name, source)),
            }
        }
        // only producers hold senders now; the bus disconnects once they all exit
        drop(tx);

        let aggregator = Aggregator::new(config, sink, clock).with_clear_handle(clear);
        let name = AGGREGATOR_THREAD_NAME.to_string();
        let stop = shutdown.clone();
        match thread::Builder::new()
            .name(name.clone())
            .spawn(move || aggregator.run(rx, stop))
        {
            Ok(join) => handle.set_aggregator(name, join),
            Err(source) => return Err(abort(handle, name, source)),
        }

        info!("pipeline started with {} sensors", handle.producer_count());
        Ok(handle)
    }
}

fn abort(handle: PipelineHandle, name: String, source: std::io::Error) -> PipelineError {
    error!("failed to spawn {}: {}", name, source);
    if let Err(e) = handle.shutdown_and_join() {
        error!("while stopping partially started pipeline: {}", e);
    }
    PipelineError::Spawn { name, source }
}

/// Builder for [`Pipeline`]
pub struct PipelineBuilder<C = MonotonicClock> {
    config: Arc<DeploymentConfig>,
    adapters: Vec<(SensorId, Box<dyn SensorAdapter>)>,
    sink: Option<Box<dyn Sink>>,
    clock: C,
    clear: Option<ClearHandle>,
    shutdown: Option<ShutdownSignal>,
}

impl PipelineBuilder {
    /// Builder with a fresh monotonic clock and no sensors
    pub fn new(config: Arc<DeploymentConfig>) -> Self {
        Self {
            config,
            adapters: Vec::new(),
            sink: None,
            clock: MonotonicClock::new(),
            clear: None,
            shutdown: None,
        }
    }
}

impl<C: TimeSource + Clone + 'static> PipelineBuilder<C> {
    /// Register the adapter for one sensor
    pub fn sensor(mut self, id: impl Into<SensorId>, adapter: impl SensorAdapter + 'static) -> Self {
        self.adapters.push((id.into(), Box::new(adapter)));
        self
    }

    /// Output sink; defaults to [`NullSink`]
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Use an externally owned clear handle
    pub fn clear_handle(mut self, clear: ClearHandle) -> Self {
        self.clear = Some(clear);
        self
    }

    /// Use an externally owned shutdown signal
    pub fn shutdown_signal(mut self, shutdown: ShutdownSignal) -> Self {
        self.shutdown = Some(shutdown);
        self
    }

    /// Replace the time source shared by all threads
    pub fn clock<T: TimeSource + Clone + 'static>(self, clock: T) -> PipelineBuilder<T> {
        PipelineBuilder {
            config: self.config,
            adapters: self.adapters,
            sink: self.sink,
            clock,
            clear: self.clear,
            shutdown: self.shutdown,
        }
    }

    /// Validate configuration and sensor set
    pub fn build(self) -> Result<Pipeline<C>, PipelineError> {
        self.config.validate()?;

        if self.adapters.is_empty() {
            return Err(PipelineError::NoProducers);
        }

        let mut seen = BTreeSet::new();
        for (id, _) in &self.adapters {
            if self.config.position(*id).is_none() {
                return Err(PipelineError::UnknownSensor(*id));
            }
            if !seen.insert(*id) {
                return Err(PipelineError::DuplicateProducer(*id));
            }
        }

        Ok(Pipeline {
            config: self.config,
            adapters: self.adapters,
            sink: self.sink.unwrap_or_else(|| Box::new(NullSink)),
            clock: self.clock,
            clear: self.clear.unwrap_or_default(),
            shutdown: self.shutdown.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SensorReadError;
    use crate::time::ManualClock;

    struct Silent;

    impl SensorAdapter for Silent {
        fn has_voice(&mut self) -> Result<bool, SensorReadError> {
            Ok(false)
        }

        fn angle_degrees(&mut self) -> Result<f64, SensorReadError> {
            Ok(0.0)
        }
    }

    fn config() -> Arc<DeploymentConfig> {
        Arc::new(DeploymentConfig::default())
    }

    #[test]
    fn build_requires_producers() {
        assert!(matches!(
            Pipeline::builder(config()).build(),
            Err(PipelineError::NoProducers)
        ));
    }

    #[test]
    fn build_rejects_unplaced_sensor() {
        let result = Pipeline::builder(config()).sensor(9, Silent).build();
        assert!(matches!(result, Err(PipelineError::UnknownSensor(id)) if id == SensorId::new(9)));
    }

    #[test]
    fn build_rejects_duplicate_sensor() {
        let result = Pipeline::builder(config()).sensor(1, Silent).sensor(1, Silent).build();
        assert!(matches!(result, Err(PipelineError::DuplicateProducer(_))));
    }

    #[test]
    fn build_validates_config() {
        let mut bad = DeploymentConfig::default();
        bad.collect_window_ms = 0;
        let result = Pipeline::builder(Arc::new(bad)).sensor(1, Silent).build();
        assert!(matches!(result, Err(PipelineError::Config(_))));
    }

    #[test]
    fn spawn_and_shutdown() {
        let pipeline = Pipeline::builder(config())
            .sensor(1, Silent)
            .sensor(2, Silent)
            .clock(ManualClock::new(0))
            .build()
            .unwrap();
        assert_eq!(pipeline.sensors(), vec![SensorId::new(1), SensorId::new(2)]);

        let handle = pipeline.spawn().unwrap();
        assert_eq!(handle.producer_count(), 2);
        let stats = handle.shutdown_and_join().unwrap();
        assert_eq!(stats.events_received, 0);
    }
}
