//! Error types for hardware operations.
//!
//! Framing, checksum and short-read failures of the sensor protocol are
//! carried unchanged inside [`HardwareError::Protocol`] so callers can still
//! tell a recoverable timeout from a corrupted exchange.

use latchkey_protocol::AckCode;

/// Result type alias for hardware operations.
pub type Result<T> = std::result::Result<T, HardwareError>;

/// Errors that can occur during hardware device operations.
#[derive(Debug, thiserror::Error)]
pub enum HardwareError {
    /// Error raised by the frame codec or the byte transport.
    #[error(transparent)]
    Protocol(#[from] latchkey_core::Error),

    /// Device is not connected or has been disconnected.
    #[error("Device disconnected: {device}")]
    Disconnected { device: String },

    /// Buffer does not have the size its dimensions require.
    #[error("Invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Operation not permitted in the device's current mode.
    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    /// The sensor answered with a non-success acknowledgement.
    #[error("Sensor rejected command: {ack}")]
    Rejected { ack: AckCode },

    /// Device communication error.
    #[error("Communication error: {message}")]
    CommunicationError { message: String },

    /// GPIO access failed.
    #[error("GPIO error: {message}")]
    Gpio { message: String },

    /// Device initialization failed.
    #[error("Initialization failed: {message}")]
    InitializationFailed { message: String },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HardwareError {
    /// Create a new disconnected error.
    pub fn disconnected(device: impl Into<String>) -> Self {
        Self::Disconnected {
            device: device.into(),
        }
    }

    /// Create a new invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a new communication error.
    pub fn communication(message: impl Into<String>) -> Self {
        Self::CommunicationError {
            message: message.into(),
        }
    }

    /// Create a new GPIO error.
    pub fn gpio(message: impl Into<String>) -> Self {
        Self::Gpio {
            message: message.into(),
        }
    }

    /// Create a new initialization failed error.
    pub fn initialization_failed(message: impl Into<String>) -> Self {
        Self::InitializationFailed {
            message: message.into(),
        }
    }

    /// Whether this is a short read the caller may retry.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Protocol(inner) if inner.is_recoverable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnected_error() {
        let error = HardwareError::disconnected("qr scanner");
        assert!(matches!(error, HardwareError::Disconnected { .. }));
        assert_eq!(error.to_string(), "Device disconnected: qr scanner");
    }

    #[test]
    fn test_protocol_error_is_transparent() {
        let error = HardwareError::from(latchkey_core::Error::framing("bad end sentinel"));
        assert_eq!(error.to_string(), "Framing error: bad end sentinel");
        assert!(!error.is_recoverable());
    }

    #[test]
    fn test_short_read_is_recoverable() {
        let error = HardwareError::from(latchkey_core::Error::timeout(198, 40));
        assert!(error.is_recoverable());
    }

    #[test]
    fn test_rejected_names_ack() {
        let error = HardwareError::Rejected {
            ack: AckCode::UserExists,
        };
        assert_eq!(error.to_string(), "Sensor rejected command: user already exists");
    }
}
