//! Hardware seam definitions.
//!
//! Two families of traits live here:
//!
//! - Low-level, synchronous device seams ([`ByteTransport`], [`OutputPin`],
//!   [`RfidReader`], [`QrScanner`]). These are object-safe and are held as
//!   `Box<dyn Trait>` so a serial port, a GPIO line or a mock can be swapped
//!   without touching the code that drives them.
//! - Async seams used by the coordinator ([`CredentialSource`],
//!   [`DoorActuator`]). These use native `async fn` (Edition 2024 RPITIT) and
//!   are dispatched through concrete types or enum wrappers, see
//!   [`crate::devices`].

#![allow(async_fn_in_trait)]

use std::time::Duration;

use latchkey_core::{CredentialEvent, CredentialKind};

use crate::error::Result;

/// A bidirectional byte stream to the fingerprint sensor.
///
/// Errors use the protocol taxonomy directly: a read that cannot be
/// completed within the transport's bounded wait fails with
/// [`latchkey_core::Error::Timeout`].
pub trait ByteTransport: Send {
    /// Bytes currently buffered and readable without waiting.
    fn bytes_available(&mut self) -> latchkey_core::Result<usize>;

    /// Fill `buf` completely or fail.
    fn read_exact(&mut self, buf: &mut [u8]) -> latchkey_core::Result<()>;

    /// Write all bytes.
    fn write_all(&mut self, bytes: &[u8]) -> latchkey_core::Result<()>;

    /// Discard any unread input.
    fn clear_input(&mut self) -> latchkey_core::Result<()>;
}

/// Logic level of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinLevel {
    Low,
    High,
}

/// A digital output line.
pub trait OutputPin: Send {
    fn set_high(&mut self) -> Result<()>;

    fn set_low(&mut self) -> Result<()>;
}

/// A contactless card reader polled for the UID of a presented card.
///
/// Implementations return the UID as text (usually upper-case hex). Reading
/// must not block for longer than a single poll.
pub trait RfidReader: Send {
    fn poll_uid(&mut self) -> Result<Option<String>>;
}

/// A camera pipeline that attempts to decode a QR code from one frame.
///
/// `scan_frame` may block for the duration of a frame capture; it is only
/// ever called from a blocking worker thread.
pub trait QrScanner: Send {
    fn scan_frame(&mut self) -> Result<Option<String>>;
}

/// Actuates the door lock.
pub trait DoorActuator: Send {
    /// Hold the door unlocked for `duration`, then lock it again.
    ///
    /// The lock must be re-engaged before this returns, even on error.
    async fn unlock_for(&mut self, duration: Duration) -> Result<()>;
}

/// A reader that can be armed to watch for one credential.
///
/// # Contract
///
/// - `arm` starts acquisition; `try_take` then returns at most one event per
///   presented credential, after which the source reports `is_armed() ==
///   false` until it is armed again.
/// - `disarm` stops acquisition and discards anything captured but not yet
///   taken. It does not return until background work has actually stopped.
/// - `try_take` never blocks waiting for a credential.
///
/// # Examples
///
/// ```
/// use latchkey_hardware::traits::CredentialSource;
/// use latchkey_hardware::mock::MockSource;
/// use latchkey_core::CredentialKind;
///
/// #[tokio::main]
/// async fn main() -> latchkey_hardware::Result<()> {
///     let (mut source, handle) = MockSource::new(CredentialKind::Rfid);
///
///     source.arm().await?;
///     assert!(source.try_take().await?.is_none());
///
///     handle.present(b"04A1B2C3".to_vec());
///     let event = source.try_take().await?.unwrap();
///     assert_eq!(event.payload(), b"04A1B2C3");
///     assert!(!source.is_armed());
///     Ok(())
/// }
/// ```
pub trait CredentialSource: Send {
    /// Kind of credential this source produces.
    fn kind(&self) -> CredentialKind;

    /// Whether acquisition is active and no credential has been taken since.
    fn is_armed(&self) -> bool;

    async fn arm(&mut self) -> Result<()>;

    async fn disarm(&mut self) -> Result<()>;

    async fn try_take(&mut self) -> Result<Option<CredentialEvent>>;
}
