//! MQTT decision channel.
//!
//! # Architecture
//!
//! ```text
//! RequestCoordinator
//!     │
//!     ├─> publish_request ──> AsyncClient ───(MQTT)───> access/door/<id>/request
//!     │
//!     └─< latest_decision <── DecisionSlot <── event loop task
//!                                                  ▲
//!                          access/door/<id>/decision
//! ```
//!
//! The event loop runs on its own task for the lifetime of the channel. It
//! re-subscribes on every `ConnAck`, so a broker restart does not silently
//! drop the decision subscription, and stamps every message on the decision
//! topic with the instant it was taken off the wire.
//!
//! Publishing never waits for a broker round trip. It only has to reach the
//! client's outgoing queue within the publish timeout, and it is refused
//! outright while the connection is down.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use latchkey_core::config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::channel::{DecisionChannel, DecisionSlot, InboundDecision};
use crate::error::{ChannelError, Result};

/// Capacity of the client's request queue.
const REQUEST_QUEUE_CAPACITY: usize = 16;

/// Pause before the event loop retries after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Decision channel over an MQTT broker.
#[derive(Debug)]
pub struct MqttChannel {
    client: AsyncClient,
    slot: DecisionSlot,
    connected: Arc<AtomicBool>,
    broker: String,
    request_topic: String,
    qos: QoS,
    publish_timeout: Duration,
    event_loop: JoinHandle<()>,
}

impl MqttChannel {
    /// Build the client and start the event loop task.
    ///
    /// Returns as soon as the task is spawned; the connection is established
    /// in the background and [`is_connected`](Self::is_connected) reports
    /// when it is up. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Fails when the QoS level is not 0-2 or the CA file cannot be read.
    pub fn connect(config: &MqttConfig) -> Result<Self> {
        let qos = qos_from_level(config.qos)?;
        let options = mqtt_options(config)?;
        let (client, event_loop) = AsyncClient::new(options, REQUEST_QUEUE_CAPACITY);

        let slot = DecisionSlot::new();
        let connected = Arc::new(AtomicBool::new(false));
        let broker = format!("{}:{}", config.host, config.port);

        info!(
            "Connecting to broker {} as {}",
            broker,
            config.client_id()
        );

        let event_loop = tokio::spawn(drive_event_loop(
            event_loop,
            client.clone(),
            config.decision_topic(),
            qos,
            slot.clone(),
            Arc::clone(&connected),
        ));

        Ok(Self {
            client,
            slot,
            connected,
            broker,
            request_topic: config.request_topic(),
            qos,
            publish_timeout: config.publish_timeout(),
            event_loop,
        })
    }

    /// Whether the broker has acknowledged the current connection.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    /// The slot decisions are written into.
    pub fn slot(&self) -> &DecisionSlot {
        &self.slot
    }

    /// Disconnect from the broker and stop the event loop task.
    pub async fn shutdown(self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("Disconnect request not delivered: {}", e);
        }
        self.event_loop.abort();
        self.connected.store(false, Ordering::Release);
        info!("Disconnected from broker {}", self.broker);
    }
}

impl DecisionChannel for MqttChannel {
    async fn publish_request(&self, payload: &str) -> Result<()> {
        if !self.is_connected() {
            return Err(ChannelError::NotConnected(self.broker.clone()));
        }

        let publish = self.client.publish(
            self.request_topic.as_str(),
            self.qos,
            false,
            payload.as_bytes().to_vec(),
        );

        match tokio::time::timeout(self.publish_timeout, publish).await {
            Ok(Ok(())) => {
                debug!("Published {} bytes to {}", payload.len(), self.request_topic);
                Ok(())
            }
            Ok(Err(e)) => Err(ChannelError::Client(e)),
            Err(_) => Err(ChannelError::PublishTimeout(
                self.publish_timeout.as_millis() as u64,
            )),
        }
    }

    fn latest_decision(&self) -> Option<InboundDecision> {
        self.slot.latest()
    }
}

async fn drive_event_loop(
    mut event_loop: EventLoop,
    client: AsyncClient,
    decision_topic: String,
    qos: QoS,
    slot: DecisionSlot,
    connected: Arc<AtomicBool>,
) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected.store(true, Ordering::Release);
                info!("Broker connection established");
                if let Err(e) = client.try_subscribe(decision_topic.as_str(), qos) {
                    warn!("Failed to subscribe to {}: {}", decision_topic, e);
                }
            }
            Ok(Event::Incoming(Packet::SubAck(_))) => {
                debug!("Subscribed to {}", decision_topic);
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                if publish.topic != decision_topic {
                    continue;
                }
                let payload = String::from_utf8_lossy(&publish.payload);
                debug!("Decision received: {}", payload.trim_end());
                slot.store(&payload);
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                connected.store(false, Ordering::Release);
                warn!("Broker closed the connection");
            }
            Ok(_) => {}
            Err(e) => {
                if connected.swap(false, Ordering::AcqRel) {
                    warn!("Broker connection lost: {}", e);
                } else {
                    debug!("Broker unreachable: {}", e);
                }
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}

fn mqtt_options(config: &MqttConfig) -> Result<MqttOptions> {
    let mut options = MqttOptions::new(config.client_id(), config.host.as_str(), config.port);
    options.set_keep_alive(config.keep_alive());
    options.set_clean_session(true);

    if let Some(user) = &config.user {
        options.set_credentials(user.as_str(), config.password.clone().unwrap_or_default());
    }

    if let Some(ca_file) = &config.ca_file {
        configure_tls(&mut options, ca_file)?;
    }

    Ok(options)
}

#[cfg(feature = "tls")]
fn configure_tls(options: &mut MqttOptions, ca_file: &std::path::Path) -> Result<()> {
    use rumqttc::{TlsConfiguration, Transport};

    let ca = std::fs::read(ca_file)?;
    options.set_transport(Transport::tls_with_config(TlsConfiguration::Simple {
        ca,
        alpn: None,
        client_auth: None,
    }));
    Ok(())
}

#[cfg(not(feature = "tls"))]
fn configure_tls(_options: &mut MqttOptions, ca_file: &std::path::Path) -> Result<()> {
    Err(ChannelError::Config(format!(
        "CA file {} given but TLS support is not compiled in",
        ca_file.display()
    )))
}

fn qos_from_level(level: u8) -> Result<QoS> {
    match level {
        0 => Ok(QoS::AtMostOnce),
        1 => Ok(QoS::AtLeastOnce),
        2 => Ok(QoS::ExactlyOnce),
        other => Err(ChannelError::Config(format!("unsupported QoS level {other}"))),
    }
}
