//! Controller errors.

use latchkey_hardware::HardwareError;
use latchkey_network::ChannelError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ControllerError {
    /// A state change the coordinator's state machine does not allow.
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error(transparent)]
    Hardware(#[from] HardwareError),

    #[error(transparent)]
    Channel(#[from] ChannelError),

    #[error(transparent)]
    Protocol(#[from] latchkey_core::Error),
}

pub type Result<T> = std::result::Result<T, ControllerError>;
