//! MQTT connector
//!
//! [`MqttConnector`] wraps a synchronous `rumqttc` client. The connection's
//! event loop runs on its own thread (`doa-mqtt`), so publishing never waits
//! on the network: `send` only enqueues, and fails with
//! [`ConnectorError::BufferFull`] when the queue is full.
//!
//! [`MqttSink`] adapts the connector to the core pipeline's sink interface.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use doafuse_core::{PositionEstimate, Sink, SinkError};
use log::{debug, info, warn};
use rumqttc::{Client, ClientError, Connection, Event, MqttOptions, Packet};
use serde::{Deserialize, Serialize};

use crate::payload::{encode, PayloadFormat};
use crate::{ConnectionStats, Connector, ConnectorError};

/// Delivery guarantee for published estimates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QoS {
    /// Fire and forget
    #[default]
    AtMostOnce,
    /// Acknowledged delivery, duplicates possible
    AtLeastOnce,
    /// Exactly-once handshake
    ExactlyOnce,
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

/// Broker and topic settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    /// Broker host name or address
    pub host: String,
    /// Broker port
    pub port: u16,
    /// Client identifier
    pub client_id: String,
    /// Keep-alive interval in seconds
    pub keep_alive_secs: u64,
    /// Optional username and password
    pub credentials: Option<(String, String)>,
    /// Topic estimates are published to
    pub topic: String,
    /// Delivery guarantee
    pub qos: QoS,
    /// Retain the last estimate on the broker
    pub retain: bool,
    /// Payload encoding
    pub format: PayloadFormat,
    /// Outgoing queue capacity
    pub queue_capacity: usize,
    /// Pause after a failed connection attempt, milliseconds
    pub reconnect_delay_ms: u64,
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1883,
            client_id: "doafuse".to_string(),
            keep_alive_secs: 30,
            credentials: None,
            topic: "ss".to_string(),
            qos: QoS::AtMostOnce,
            retain: false,
            format: PayloadFormat::Centimeters,
            queue_capacity: 64,
            reconnect_delay_ms: 1_000,
        }
    }
}

impl MqttConfig {
    /// Defaults for the given broker
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    /// Set the topic
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = topic.into();
        self
    }

    /// Set the client identifier
    pub fn with_client_id(mut self, id: impl Into<String>) -> Self {
        self.client_id = id.into();
        self
    }

    /// Set the payload format
    pub fn with_format(mut self, format: PayloadFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the delivery guarantee
    pub fn with_qos(mut self, qos: QoS) -> Self {
        self.qos = qos;
        self
    }

    /// Authenticate with username and password
    pub fn with_credentials(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Reject settings the client cannot work with
    pub fn validate(&self) -> Result<(), ConnectorError> {
        if self.host.is_empty() {
            return Err(ConnectorError::ConfigError("broker host is empty".into()));
        }
        if self.client_id.is_empty() {
            return Err(ConnectorError::ConfigError("client id is empty".into()));
        }
        if self.topic.is_empty() || self.topic.contains(['+', '#']) {
            return Err(ConnectorError::ConfigError(format!(
                "invalid publish topic {:?}",
                self.topic
            )));
        }
        // rumqttc rejects keep-alive below 5 s
        if self.keep_alive_secs < 5 {
            return Err(ConnectorError::ConfigError("keep-alive must be at least 5 s".into()));
        }
        if self.queue_capacity == 0 {
            return Err(ConnectorError::ConfigError("queue capacity must be positive".into()));
        }
        Ok(())
    }

    fn options(&self) -> MqttOptions {
        let mut options = MqttOptions::new(self.client_id.clone(), self.host.clone(), self.port);
        options.set_keep_alive(Duration::from_secs(self.keep_alive_secs));
        options.set_clean_session(true);
        if let Some((username, password)) = &self.credentials {
            options.set_credentials(username.clone(), password.clone());
        }
        options
    }
}

/// Connection state shared with the event-loop thread
#[derive(Debug, Default)]
struct LinkState {
    connected: AtomicBool,
    stopping: AtomicBool,
    connections: AtomicU32,
}

/// MQTT client with a background event loop
pub struct MqttConnector {
    client: Client,
    qos: rumqttc::QoS,
    retain: bool,
    link: Arc<LinkState>,
    stats: ConnectionStats,
}

impl MqttConnector {
    /// Create the client and start its event-loop thread
    ///
    /// Returns as soon as the thread runs; the broker connection is
    /// established (and re-established) in the background.
    pub fn connect(config: &MqttConfig) -> Result<Self, ConnectorError> {
        config.validate()?;

        let (client, connection) = Client::new(config.options(), config.queue_capacity);
        let link = Arc::new(LinkState::default());
        let reconnect_delay = Duration::from_millis(config.reconnect_delay_ms);

        let thread_link = link.clone();
        thread::Builder::new()
            .name("doa-mqtt".into())
            .spawn(move || drive(connection, thread_link, reconnect_delay))
            .map_err(|e| ConnectorError::ProtocolError(format!("failed to start event loop: {}", e)))?;

        info!("mqtt client {} targeting {}:{}", config.client_id, config.host, config.port);
        Ok(Self {
            client,
            qos: config.qos.into(),
            retain: config.retain,
            link,
            stats: ConnectionStats::default(),
        })
    }
}

/// Poll the connection until the client is dropped or stopped
fn drive(mut connection: Connection, link: Arc<LinkState>, reconnect_delay: Duration) {
    for notification in connection.iter() {
        if link.stopping.load(Ordering::SeqCst) {
            break;
        }
        match notification {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                link.connected.store(true, Ordering::SeqCst);
                let n = link.connections.fetch_add(1, Ordering::SeqCst) + 1;
                info!("mqtt connected (connection #{})", n);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                link.connected.store(false, Ordering::SeqCst);
                info!("mqtt broker closed the session");
            }
            Ok(event) => debug!("mqtt {:?}", event),
            Err(e) => {
                if link.connected.swap(false, Ordering::SeqCst) {
                    warn!("mqtt connection lost: {}", e);
                } else {
                    debug!("mqtt connect failed: {}", e);
                }
                thread::sleep(reconnect_delay);
            }
        }
    }
    link.connected.store(false, Ordering::SeqCst);
    debug!("mqtt event loop finished");
}

impl Connector for MqttConnector {
    type Error = ConnectorError;

    fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
        match self.client.try_publish(topic, self.qos, self.retain, data.to_vec()) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                self.stats.bytes_sent += data.len() as u64;
                Ok(())
            }
            Err(e) => {
                self.stats.messages_failed += 1;
                self.stats.last_error = Some(e.to_string());
                Err(match e {
                    ClientError::TryRequest(_) => ConnectorError::BufferFull,
                    other => ConnectorError::ProtocolError(other.to_string()),
                })
            }
        }
    }

    fn is_connected(&self) -> bool {
        self.link.connected.load(Ordering::SeqCst)
    }

    fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            reconnections: self.link.connections.load(Ordering::SeqCst),
            ..self.stats.clone()
        }
    }
}

impl Drop for MqttConnector {
    fn drop(&mut self) {
        self.link.stopping.store(true, Ordering::SeqCst);
        if let Err(e) = self.client.try_disconnect() {
            debug!("mqtt disconnect not sent: {}", e);
        }
    }
}

/// Publishes every estimate to one topic
pub struct MqttSink<C = MqttConnector> {
    connector: C,
    topic: String,
    format: PayloadFormat,
}

impl MqttSink {
    /// Connect to the broker described by `config`
    pub fn connect(config: MqttConfig) -> Result<Self, ConnectorError> {
        let connector = MqttConnector::connect(&config)?;
        Ok(Self::with_connector(connector, config.topic, config.format))
    }
}

impl<C> MqttSink<C>
where
    C: Connector<Error = ConnectorError>,
{
    /// Sink over an existing connector
    pub fn with_connector(connector: C, topic: impl Into<String>, format: PayloadFormat) -> Self {
        Self {
            connector,
            topic: topic.into(),
            format,
        }
    }

    /// Underlying connector
    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Topic estimates go to
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl<C> Sink for MqttSink<C>
where
    C: Connector<Error = ConnectorError> + Send,
{
    fn publish(&mut self, estimate: &PositionEstimate) -> Result<(), SinkError> {
        let payload = encode(estimate, self.format)?;
        self.connector.send(&self.topic, &payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doafuse_core::Point;

    #[derive(Default)]
    struct Captured {
        messages: Vec<(String, Vec<u8>)>,
        full: bool,
    }

    impl Connector for Captured {
        type Error = ConnectorError;

        fn send(&mut self, topic: &str, data: &[u8]) -> Result<(), Self::Error> {
            if self.full {
                return Err(ConnectorError::BufferFull);
            }
            self.messages.push((topic.to_string(), data.to_vec()));
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        fn stats(&self) -> ConnectionStats {
            ConnectionStats {
                messages_sent: self.messages.len() as u64,
                ..ConnectionStats::default()
            }
        }
    }

    fn estimate() -> PositionEstimate {
        PositionEstimate {
            position: Point::new(1.234, -0.567),
            raw: Point::new(1.234, -0.567),
            clamped: false,
            timestamp: 0,
            sources: Vec::new(),
        }
    }

    #[test]
    fn default_config_matches_deployment() {
        let config = MqttConfig::default();
        assert_eq!(config.topic, "ss");
        assert_eq!(config.port, 1883);
        assert_eq!(config.format, PayloadFormat::Centimeters);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn config_validation() {
        assert!(MqttConfig::new("", 1883).validate().is_err());
        assert!(MqttConfig::default().with_topic("rooms/+").validate().is_err());
        assert!(MqttConfig::default().with_client_id("").validate().is_err());

        let mut config = MqttConfig::default();
        config.keep_alive_secs = 1;
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_from_json_fills_defaults() {
        let config: MqttConfig = serde_json::from_str(r#"{"host": "192.168.1.238", "qos": "at_least_once"}"#).unwrap();
        assert_eq!(config.host, "192.168.1.238");
        assert_eq!(config.qos, QoS::AtLeastOnce);
        assert_eq!(config.topic, "ss");
        assert_eq!(rumqttc::QoS::from(config.qos), rumqttc::QoS::AtLeastOnce);
    }

    #[test]
    fn sink_publishes_centimeter_payload() {
        let mut sink = MqttSink::with_connector(Captured::default(), "ss", PayloadFormat::Centimeters);
        sink.publish(&estimate()).unwrap();

        let messages = &sink.connector().messages;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "ss");
        assert_eq!(messages[0].1, b"123,-56");
    }

    #[test]
    fn full_queue_is_reported_as_unavailable() {
        let connector = Captured { full: true, ..Captured::default() };
        let mut sink = MqttSink::with_connector(connector, "ss", PayloadFormat::Json);
        assert!(matches!(sink.publish(&estimate()), Err(SinkError::Unavailable(_))));
    }

    #[test]
    fn connector_queues_while_broker_unreachable() {
        let mut config = MqttConfig::new("127.0.0.1", 1);
        config.reconnect_delay_ms = 10;
        let mut connector = MqttConnector::connect(&config).unwrap();

        assert!(connector.send("ss", b"0,0").is_ok());
        let stats = connector.stats();
        assert_eq!(stats.messages_sent, 1);
        assert_eq!(stats.bytes_sent, 3);
    }
}
