//! Controller configuration.
//!
//! Configuration is read once at startup from a TOML file, overridden from
//! environment variables and validated. The resulting [`ControllerConfig`] is
//! never mutated afterwards; components receive references to the section
//! they need.
//!
//! ```toml
//! [mqtt]
//! host = "192.168.0.102"
//! door_id = "lab"
//! user = "door"
//!
//! [serial]
//! port = "/dev/ttyAMA0"
//!
//! [timing]
//! response_window_ms = 4000
//! ```
//!
//! Recognised environment overrides: `MQTT_HOST`, `MQTT_PORT`, `MQTT_USER`,
//! `MQTT_PASSWORD`, `MQTT_QOS`, `MQTT_CAFILE`, `DOOR_ID`, `SERIAL_PORT`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::constants::*;
use crate::{Error, Result};

/// Complete controller configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ControllerConfig {
    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub gpio: GpioConfig,

    #[serde(default)]
    pub timing: TimingConfig,

    #[serde(default)]
    pub sources: SourcesConfig,
}

impl ControllerConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the document is not valid TOML or a field
    /// has the wrong type.
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    /// Load configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read and [`Error::Config`]
    /// if it cannot be parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Apply overrides from a variable lookup, usually the process
    /// environment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a numeric variable does not parse.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(host) = lookup("MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("MQTT_PORT") {
            self.mqtt.port = parse_env("MQTT_PORT", &port)?;
        }
        if let Some(user) = lookup("MQTT_USER") {
            self.mqtt.user = Some(user);
        }
        if let Some(password) = lookup("MQTT_PASSWORD") {
            self.mqtt.password = Some(password);
        }
        if let Some(qos) = lookup("MQTT_QOS") {
            self.mqtt.qos = parse_env("MQTT_QOS", &qos)?;
        }
        if let Some(ca_file) = lookup("MQTT_CAFILE") {
            self.mqtt.ca_file = Some(PathBuf::from(ca_file));
        }
        if let Some(door_id) = lookup("DOOR_ID") {
            self.mqtt.door_id = door_id;
        }
        if let Some(port) = lookup("SERIAL_PORT") {
            self.serial.port = port;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        if self.mqtt.host.trim().is_empty() {
            return Err(Error::Config("mqtt.host must not be empty".into()));
        }
        if !(1..=2).contains(&self.mqtt.qos) {
            return Err(Error::Config(format!(
                "mqtt.qos must be 1 or 2, got {}",
                self.mqtt.qos
            )));
        }
        if self.mqtt.door_id.is_empty()
            || self.mqtt.door_id.contains(['/', '+', '#'])
        {
            return Err(Error::Config(format!(
                "mqtt.door_id {:?} is not a valid topic segment",
                self.mqtt.door_id
            )));
        }
        if self.mqtt.user.is_none() && self.mqtt.password.is_some() {
            return Err(Error::Config("mqtt.password set without mqtt.user".into()));
        }
        if self.serial.baud_rate == 0 {
            return Err(Error::Config("serial.baud_rate must be positive".into()));
        }
        if self.gpio.relay_pin == self.gpio.reset_pin {
            return Err(Error::Config(format!(
                "gpio.relay_pin and gpio.reset_pin both use pin {}",
                self.gpio.relay_pin
            )));
        }
        for (name, value) in [
            ("timing.response_window_ms", self.timing.response_window_ms),
            ("timing.decision_poll_ms", self.timing.decision_poll_ms),
            ("timing.idle_tick_ms", self.timing.idle_tick_ms),
        ] {
            if value == 0 {
                return Err(Error::Config(format!("{name} must be positive")));
            }
        }
        if !self.sources.any_enabled() {
            return Err(Error::Config("at least one credential source must be enabled".into()));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("{key}={value:?} is not a valid number")))
}

/// Broker connection and topic settings.
#[derive(Clone, Deserialize)]
pub struct MqttConfig {
    #[serde(default = "default_mqtt_host")]
    pub host: String,

    #[serde(default = "default_mqtt_port")]
    pub port: u16,

    /// Client identifier; derived from the door id when absent.
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_door_id")]
    pub door_id: String,

    #[serde(default = "default_mqtt_qos")]
    pub qos: u8,

    #[serde(default = "default_keep_alive_secs")]
    pub keep_alive_secs: u64,

    #[serde(default = "default_publish_timeout_ms")]
    pub publish_timeout_ms: u64,

    /// CA bundle for TLS connections to the broker.
    #[serde(default)]
    pub ca_file: Option<PathBuf>,
}

impl MqttConfig {
    /// Topic requests are published to.
    #[must_use]
    pub fn request_topic(&self) -> String {
        format!("{TOPIC_PREFIX}/{}/request", self.door_id)
    }

    /// Topic decisions arrive on.
    #[must_use]
    pub fn decision_topic(&self) -> String {
        format!("{TOPIC_PREFIX}/{}/decision", self.door_id)
    }

    #[must_use]
    pub fn client_id(&self) -> String {
        self.client_id
            .clone()
            .unwrap_or_else(|| format!("latchkey-{}", self.door_id))
    }

    #[must_use]
    pub fn publish_timeout(&self) -> Duration {
        Duration::from_millis(self.publish_timeout_ms)
    }

    #[must_use]
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keep_alive_secs)
    }
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            host: default_mqtt_host(),
            port: default_mqtt_port(),
            client_id: None,
            user: None,
            password: None,
            door_id: default_door_id(),
            qos: default_mqtt_qos(),
            keep_alive_secs: default_keep_alive_secs(),
            publish_timeout_ms: default_publish_timeout_ms(),
            ca_file: None,
        }
    }
}

impl fmt::Debug for MqttConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MqttConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("client_id", &self.client_id)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("door_id", &self.door_id)
            .field("qos", &self.qos)
            .field("keep_alive_secs", &self.keep_alive_secs)
            .field("publish_timeout_ms", &self.publish_timeout_ms)
            .field("ca_file", &self.ca_file)
            .finish()
    }
}

fn default_mqtt_host() -> String {
    DEFAULT_MQTT_HOST.to_string()
}

fn default_mqtt_port() -> u16 {
    DEFAULT_MQTT_PORT
}

fn default_door_id() -> String {
    DEFAULT_DOOR_ID.to_string()
}

fn default_mqtt_qos() -> u8 {
    DEFAULT_MQTT_QOS
}

fn default_keep_alive_secs() -> u64 {
    DEFAULT_MQTT_KEEP_ALIVE_SECS
}

fn default_publish_timeout_ms() -> u64 {
    DEFAULT_PUBLISH_TIMEOUT_MS
}

/// Serial line of the fingerprint sensor.
#[derive(Debug, Clone, Deserialize)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    /// Bounded wait of a single blocking read.
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
}

impl SerialConfig {
    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
        }
    }
}

fn default_serial_port() -> String {
    DEFAULT_SERIAL_PORT.to_string()
}

fn default_baud_rate() -> u32 {
    DEFAULT_BAUD_RATE
}

fn default_read_timeout_ms() -> u64 {
    DEFAULT_READ_TIMEOUT_MS
}

/// BCM pin assignments.
#[derive(Debug, Clone, Deserialize)]
pub struct GpioConfig {
    #[serde(default = "default_relay_pin")]
    pub relay_pin: u8,

    #[serde(default = "default_reset_pin")]
    pub reset_pin: u8,
}

impl Default for GpioConfig {
    fn default() -> Self {
        Self {
            relay_pin: default_relay_pin(),
            reset_pin: default_reset_pin(),
        }
    }
}

fn default_relay_pin() -> u8 {
    DEFAULT_RELAY_PIN
}

fn default_reset_pin() -> u8 {
    DEFAULT_RESET_PIN
}

/// Timing of the request/decision cycle.
#[derive(Debug, Clone, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_response_window_ms")]
    pub response_window_ms: u64,

    #[serde(default = "default_unlock_ms")]
    pub unlock_ms: u64,

    #[serde(default = "default_decision_poll_ms")]
    pub decision_poll_ms: u64,

    #[serde(default = "default_idle_tick_ms")]
    pub idle_tick_ms: u64,

    #[serde(default = "default_qr_frame_interval_ms")]
    pub qr_frame_interval_ms: u64,

    #[serde(default = "default_capture_min_bytes")]
    pub capture_min_bytes: usize,
}

impl TimingConfig {
    #[must_use]
    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    #[must_use]
    pub fn unlock_duration(&self) -> Duration {
        Duration::from_millis(self.unlock_ms)
    }

    #[must_use]
    pub fn decision_poll(&self) -> Duration {
        Duration::from_millis(self.decision_poll_ms)
    }

    #[must_use]
    pub fn idle_tick(&self) -> Duration {
        Duration::from_millis(self.idle_tick_ms)
    }

    #[must_use]
    pub fn qr_frame_interval(&self) -> Duration {
        Duration::from_millis(self.qr_frame_interval_ms)
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            response_window_ms: default_response_window_ms(),
            unlock_ms: default_unlock_ms(),
            decision_poll_ms: default_decision_poll_ms(),
            idle_tick_ms: default_idle_tick_ms(),
            qr_frame_interval_ms: default_qr_frame_interval_ms(),
            capture_min_bytes: default_capture_min_bytes(),
        }
    }
}

fn default_response_window_ms() -> u64 {
    DEFAULT_RESPONSE_WINDOW_MS
}

fn default_unlock_ms() -> u64 {
    DEFAULT_UNLOCK_MS
}

fn default_decision_poll_ms() -> u64 {
    DEFAULT_DECISION_POLL_MS
}

fn default_idle_tick_ms() -> u64 {
    DEFAULT_IDLE_TICK_MS
}

fn default_qr_frame_interval_ms() -> u64 {
    DEFAULT_QR_FRAME_INTERVAL_MS
}

fn default_capture_min_bytes() -> usize {
    CAPTURE_MIN_BYTES
}

/// Which credential sources take part in arbitration.
#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_true")]
    pub rfid: bool,

    #[serde(default = "default_true")]
    pub fingerprint: bool,

    #[serde(default = "default_true")]
    pub qr: bool,
}

impl SourcesConfig {
    #[must_use]
    pub fn any_enabled(&self) -> bool {
        self.rfid || self.fingerprint || self.qr
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            rfid: true,
            fingerprint: true,
            qr: true,
        }
    }
}

fn default_true() -> bool {
    true
}
