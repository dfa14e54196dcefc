//! Shared building blocks for the Latchkey door controller.
//!
//! This crate holds the pieces every other crate agrees on:
//!
//! - [`error`]: the protocol error taxonomy ([`Error`], [`Result`])
//! - [`constants`]: wire-level and timing constants of the sensor and the controller
//! - [`types`]: credential events, decisions and pending requests
//! - [`config`]: the immutable controller configuration
//!
//! # Examples
//!
//! ```
//! use latchkey_core::{CredentialEvent, CredentialKind};
//!
//! let event = CredentialEvent::now(CredentialKind::Rfid, b"04A1B2C3".to_vec());
//! assert_eq!(event.kind().type_tag(), "rfid");
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod types;

pub use config::ControllerConfig;
pub use error::{Error, Result};
pub use types::*;

/// Version info
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
