//! Enum wrapper for credential source dispatch.
//!
//! Native `async fn` in traits (RPITIT, Edition 2024) is not object-safe, so
//! a heterogeneous, ordered list of sources cannot be a
//! `Vec<Box<dyn CredentialSource>>`. [`AnyCredentialSource`] provides the
//! concrete dispatch instead.
//!
//! # Examples
//!
//! ```
//! use latchkey_core::CredentialKind;
//! use latchkey_hardware::devices::AnyCredentialSource;
//! use latchkey_hardware::mock::{MockRfidReader, MockSource};
//! use latchkey_hardware::sources::RfidSource;
//! use latchkey_hardware::traits::CredentialSource;
//!
//! let (reader, _reader_handle) = MockRfidReader::new();
//! let (qr, _qr_handle) = MockSource::new(CredentialKind::Qr);
//!
//! let sources = vec![
//!     AnyCredentialSource::from(RfidSource::new(Box::new(reader))),
//!     AnyCredentialSource::Mock(qr),
//! ];
//! let kinds: Vec<_> = sources.iter().map(|s| s.kind()).collect();
//! assert_eq!(kinds, vec![CredentialKind::Rfid, CredentialKind::Qr]);
//! ```

use latchkey_core::{CredentialEvent, CredentialKind};

use crate::error::Result;
use crate::mock::MockSource;
use crate::sources::{FingerprintSource, QrSource, RfidSource};
use crate::traits::CredentialSource;

/// Any credential source the coordinator can arbitrate.
#[derive(Debug)]
#[non_exhaustive]
pub enum AnyCredentialSource {
    Fingerprint(FingerprintSource),
    Rfid(RfidSource),
    Qr(QrSource),
    /// Scripted source for development and testing.
    Mock(MockSource),
}

impl CredentialSource for AnyCredentialSource {
    fn kind(&self) -> CredentialKind {
        match self {
            Self::Fingerprint(source) => source.kind(),
            Self::Rfid(source) => source.kind(),
            Self::Qr(source) => source.kind(),
            Self::Mock(source) => source.kind(),
        }
    }

    fn is_armed(&self) -> bool {
        match self {
            Self::Fingerprint(source) => source.is_armed(),
            Self::Rfid(source) => source.is_armed(),
            Self::Qr(source) => source.is_armed(),
            Self::Mock(source) => source.is_armed(),
        }
    }

    async fn arm(&mut self) -> Result<()> {
        match self {
            Self::Fingerprint(source) => source.arm().await,
            Self::Rfid(source) => source.arm().await,
            Self::Qr(source) => source.arm().await,
            Self::Mock(source) => source.arm().await,
        }
    }

    async fn disarm(&mut self) -> Result<()> {
        match self {
            Self::Fingerprint(source) => source.disarm().await,
            Self::Rfid(source) => source.disarm().await,
            Self::Qr(source) => source.disarm().await,
            Self::Mock(source) => source.disarm().await,
        }
    }

    async fn try_take(&mut self) -> Result<Option<CredentialEvent>> {
        match self {
            Self::Fingerprint(source) => source.try_take().await,
            Self::Rfid(source) => source.try_take().await,
            Self::Qr(source) => source.try_take().await,
            Self::Mock(source) => source.try_take().await,
        }
    }
}

impl From<FingerprintSource> for AnyCredentialSource {
    fn from(source: FingerprintSource) -> Self {
        Self::Fingerprint(source)
    }
}

impl From<RfidSource> for AnyCredentialSource {
    fn from(source: RfidSource) -> Self {
        Self::Rfid(source)
    }
}

impl From<QrSource> for AnyCredentialSource {
    fn from(source: QrSource) -> Self {
        Self::Qr(source)
    }
}

impl From<MockSource> for AnyCredentialSource {
    fn from(source: MockSource) -> Self {
        Self::Mock(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dispatch_reaches_wrapped_source() {
        let (mock, handle) = MockSource::new(CredentialKind::Fingerprint);
        let mut source = AnyCredentialSource::from(mock);

        source.arm().await.unwrap();
        assert!(source.is_armed());
        assert_eq!(handle.arm_count(), 1);

        handle.present(vec![1, 2, 3]);
        let event = source.try_take().await.unwrap().unwrap();
        assert_eq!(event.kind(), CredentialKind::Fingerprint);

        source.disarm().await.unwrap();
        assert_eq!(handle.disarm_count(), 1);
    }
}
