//! Simulated Room Example
//!
//! Runs the full pipeline against four simulated microphone arrays that all
//! hear a speaker walking slowly across the reference room.
//!
//! ## What You'll Learn
//!
//! - Implementing `SensorAdapter` for a sensor driver
//! - Building and spawning a pipeline
//! - Receiving estimates and window frames through a custom `Sink`
//! - Clearing history and shutting down cleanly
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_simulated_room
//! ```

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use doafuse_core::{
    geometry::normalize_degrees, DeploymentConfig, Pipeline, Point, PositionEstimate, SensorAdapter,
    SensorReadError, Sink, SinkError, WindowFrame,
};

/// Speaker position shared by all simulated sensors
#[derive(Clone)]
struct Speaker {
    position: Arc<Mutex<Point>>,
}

impl Speaker {
    fn at(&self) -> Point {
        *self.position.lock().unwrap()
    }

    fn move_to(&self, point: Point) {
        *self.position.lock().unwrap() = point;
    }
}

/// Array that hears the speaker on every fifth poll
struct SimulatedArray {
    origin: Point,
    speaker: Speaker,
    bearing_offset_deg: f64,
    polls: u32,
}

impl SensorAdapter for SimulatedArray {
    fn has_voice(&mut self) -> Result<bool, SensorReadError> {
        self.polls += 1;
        Ok(self.polls % 5 == 0)
    }

    fn angle_degrees(&mut self) -> Result<f64, SensorReadError> {
        let target = self.speaker.at();
        let world = (target.y - self.origin.y).atan2(target.x - self.origin.x).to_degrees();
        Ok(normalize_degrees(world - self.bearing_offset_deg))
    }
}

/// Prints every estimate and a one-line frame summary
struct ConsoleSink;

impl Sink for ConsoleSink {
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        println!(
            "  estimate ({:+.2}, {:+.2}) m from sensors {:?}{}",
            estimate.position.x,
            estimate.position.y,
            estimate.sensors().iter().map(|s| s.get()).collect::<Vec<_>>(),
            if estimate.clamped { " [clamped]" } else { "" }
        );
        Ok(())
    }

    fn render(&mut self, frame: &WindowFrame) -> Result<(), SinkError> {
        println!(
            "  window {}..{} ms: {} events, {} live detections",
            frame.opened_at,
            frame.closed_at,
            frame.events.len(),
            frame.history.len()
        );
        Ok(())
    }

    fn cleared(&mut self) -> Result<(), SinkError> {
        println!("  -- history cleared --");
        Ok(())
    }
}

fn main() {
    println!("doafuse Simulated Room Example");
    println!("==============================\n");

    let config = Arc::new(DeploymentConfig::default());
    println!("Sensors:");
    for placement in &config.sensors {
        println!("  {} at ({:+.2}, {:+.2})", placement.id, placement.x, placement.y);
    }
    println!();

    let speaker = Speaker { position: Arc::new(Mutex::new(Point::new(-0.8, -0.3))) };

    let mut builder = Pipeline::builder(config.clone()).sink(ConsoleSink);
    for placement in &config.sensors {
        builder = builder.sensor(
            placement.id,
            SimulatedArray {
                origin: placement.position(),
                speaker: speaker.clone(),
                bearing_offset_deg: config.bearing_offset_deg,
                polls: 0,
            },
        );
    }

    let handle = match builder.build().and_then(|pipeline| pipeline.spawn()) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Failed to start pipeline: {}", e);
            return;
        }
    };

    // walk from left to right across the front half of the room
    let start = Instant::now();
    while start.elapsed() < Duration::from_secs(3) {
        let progress = start.elapsed().as_secs_f64() / 3.0;
        speaker.move_to(Point::new(-0.8 + 1.6 * progress, -0.3 - 0.6 * progress));
        thread::sleep(Duration::from_millis(100));
    }

    handle.clear_handle().request();
    thread::sleep(Duration::from_millis(500));

    match handle.shutdown_and_join() {
        Ok(stats) => {
            println!("\nSummary:");
            println!("  events received: {}", stats.events_received);
            println!("  windows closed:  {}", stats.windows_closed);
            println!("  estimates:       {}", stats.estimates);
            println!("  degenerate:      {}", stats.degenerate_windows);
        }
        Err(e) => eprintln!("Pipeline failed: {}", e),
    }
}
