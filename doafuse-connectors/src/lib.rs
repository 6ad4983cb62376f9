//! Transport connectors for doafuse position estimates
//!
//! ## Overview
//!
//! The core pipeline hands every estimate to a [`doafuse_core::Sink`]. This
//! crate provides sinks that move estimates off the machine.
//!
//! ### MQTT
//!
//! **When to use:**
//! - A broker is already running on the local network
//! - Several consumers (displays, home automation) want the same positions
//!
//! **Characteristics:**
//! - One message per estimate on a single topic (default `ss`)
//! - Publishing only enqueues; a background thread owns the network connection
//!   and reconnects on failure
//! - QoS 0 by default; a lost position is superseded by the next window
//!
//! ## Payloads
//!
//! See [`payload`]. The default is the compact `"<x_cm>,<y_cm>"` text form
//! understood by existing display clients; JSON carries timestamp, clamping
//! and contributing sensors as well.
//!
//! ## Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use doafuse_connectors::mqtt::{MqttConfig, MqttSink};
//! use doafuse_core::{DeploymentConfig, Pipeline};
//!
//! let mqtt = MqttConfig::new("192.168.1.238", 1883).with_topic("ss");
//! let sink = MqttSink::connect(mqtt)?;
//!
//! let pipeline = Pipeline::builder(Arc::new(DeploymentConfig::default()))
//!     .sink(sink);
//! # Ok::<(), doafuse_connectors::ConnectorError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod payload;

#[cfg(feature = "mqtt")]
pub mod mqtt;

// Re-export common types
#[cfg(feature = "mqtt")]
pub use mqtt::{MqttConfig, MqttConnector, MqttSink, QoS};
pub use payload::PayloadFormat;

use doafuse_core::SinkError;
use thiserror::Error;

/// Common connector errors
#[derive(Debug, Error)]
pub enum ConnectorError {
    /// No connection to the remote end
    #[error("Not connected")]
    NotConnected,

    /// Outgoing queue is full
    #[error("Buffer full")]
    BufferFull,

    /// Remote end did not answer in time
    #[error("Timeout")]
    Timeout,

    /// Protocol-level failure
    #[error("Protocol error: {0}")]
    ProtocolError(String),

    /// Connector settings rejected
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Estimate could not be encoded
    #[error("Encoding error: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<ConnectorError> for SinkError {
    fn from(e: ConnectorError) -> Self {
        match e {
            ConnectorError::NotConnected | ConnectorError::BufferFull | ConnectorError::Timeout => {
                SinkError::Unavailable(e.to_string())
            }
            other => SinkError::Publish(other.to_string()),
        }
    }
}

/// Trait for all protocol connectors
pub trait Connector {
    /// Error returned by [`send`](Connector::send)
    type Error;

    /// Send one payload to `topic`
    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error>;

    /// Check if connected
    fn is_connected(&self) -> bool;

    /// Get connection statistics
    fn stats(&self) -> ConnectionStats;
}

/// Connection statistics common to all connectors
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Messages handed to the transport
    pub messages_sent: u64,
    /// Messages the transport refused
    pub messages_failed: u64,
    /// Payload bytes handed to the transport
    pub bytes_sent: u64,
    /// Successful (re)connections
    pub reconnections: u32,
    /// Last error message
    pub last_error: Option<String>,
}
