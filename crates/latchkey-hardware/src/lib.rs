//! Hardware layer of the Latchkey door controller.
//!
//! This crate turns physical readers into credential sources the
//! coordinator can arbitrate, and drives the door relay.
//!
//! # Layers
//!
//! - **Seams** ([`traits`]): a byte transport to the fingerprint sensor,
//!   output pins, an RFID reader and a QR scanner. Real backends and mocks
//!   implement the same traits.
//! - **Drivers** ([`fingerprint`], [`relay`]): the sensor's continuous
//!   capture and maintenance commands, and the lock relay.
//! - **Sources** ([`sources`], [`devices`]): every reader behind the same
//!   arm / take / disarm contract, dispatched through
//!   [`AnyCredentialSource`].
//!
//! # Features
//!
//! - `hardware-serial`: [`serial::SerialTransport`] over the `serialport` crate
//! - `hardware-gpio`: [`gpio::RppalOutputPin`] over the `rppal` crate
//!
//! Without either feature only the [`mock`] devices are available, which is
//! enough for development and tests.
//!
//! # Examples
//!
//! ```
//! use latchkey_core::CredentialKind;
//! use latchkey_hardware::mock::MockRfidReader;
//! use latchkey_hardware::sources::RfidSource;
//! use latchkey_hardware::traits::CredentialSource;
//!
//! #[tokio::main]
//! async fn main() -> latchkey_hardware::Result<()> {
//!     let (reader, card) = MockRfidReader::new();
//!     let mut source = RfidSource::new(Box::new(reader));
//!
//!     source.arm().await?;
//!     card.present("04A1B2C3");
//!
//!     let event = source.try_take().await?.expect("card presented");
//!     assert_eq!(event.kind(), CredentialKind::Rfid);
//!     Ok(())
//! }
//! ```

pub mod devices;
pub mod error;
pub mod fingerprint;
pub mod mock;
pub mod relay;
pub mod sources;
pub mod traits;

#[cfg(feature = "hardware-gpio")]
pub mod gpio;
#[cfg(feature = "hardware-serial")]
pub mod serial;

pub use devices::AnyCredentialSource;
pub use error::{HardwareError, Result};
pub use fingerprint::{
    DriverMode, FingerprintDriver, Identification, RESET_IDLE_LEVEL, unpack_image,
};
pub use relay::RelayActuator;
pub use sources::{FingerprintSource, QrSource, RfidSource};
pub use traits::{
    ByteTransport, CredentialSource, DoorActuator, OutputPin, PinLevel, QrScanner, RfidReader,
};
