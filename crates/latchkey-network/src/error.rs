//! Errors of the decision channel.

use thiserror::Error;

/// Failure to hand a request to the broker.
///
/// Every variant means the request may not have left this process; the
/// coordinator treats all of them as a deny.
#[derive(Debug, Error)]
pub enum ChannelError {
    /// The broker connection is down.
    #[error("Not connected to broker {0}")]
    NotConnected(String),

    /// Publishing did not complete within the configured bound.
    #[error("Publish timeout after {0}ms")]
    PublishTimeout(u64),

    /// The publish was refused.
    #[error("Publish failed: {0}")]
    PublishFailed(String),

    /// The MQTT client rejected the request.
    #[error("MQTT client error: {0}")]
    Client(#[from] rumqttc::ClientError),

    /// Broker options could not be built.
    #[error("Invalid channel configuration: {0}")]
    Config(String),

    /// TLS material could not be read.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for channel operations.
pub type Result<T> = std::result::Result<T, ChannelError>;
