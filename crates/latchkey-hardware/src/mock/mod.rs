//! Mock device implementations for testing and development.
//!
//! Every mock comes with a handle that shares its state, so a test can drive
//! the device (feed bytes, present a card, show a QR code) while the code
//! under test owns the device itself.

pub mod pin;
pub mod qr;
pub mod rfid;
pub mod source;
pub mod transport;

pub use pin::{MockPin, MockPinHandle, PinLevel};
pub use qr::{MockQrScanner, MockQrScannerHandle};
pub use rfid::{MockRfidReader, MockRfidReaderHandle};
pub use source::{MockSource, MockSourceHandle};
pub use transport::{MockTransport, MockTransportHandle};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock shared mock state, ignoring poisoning from a panicked test thread.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
