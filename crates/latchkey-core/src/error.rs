use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    // Framing errors
    #[error("Framing error: {0}")]
    Framing(String),

    #[error("Checksum mismatch: expected {expected:#04x}, got {actual:#04x}")]
    ChecksumMismatch { expected: u8, actual: u8 },

    #[error("Payload too large: {len} bytes (maximum {max})")]
    PayloadTooLarge { len: usize, max: usize },

    #[error("Timed out waiting for {expected} bytes, received {received}")]
    Timeout { expected: usize, received: usize },

    #[error("Unexpected response: expected command {expected:#04x}, got {actual:#04x}")]
    UnexpectedResponse { expected: u8, actual: u8 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    // Decision errors
    #[error("Malformed decision: {0}")]
    MalformedDecision(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Create a framing error.
    pub fn framing(message: impl Into<String>) -> Self {
        Self::Framing(message.into())
    }

    /// Create a timeout error for a short read.
    pub fn timeout(expected: usize, received: usize) -> Self {
        Self::Timeout { expected, received }
    }

    /// Whether the caller may retry the exchange on its next poll.
    ///
    /// Framing and checksum failures leave the byte stream in an unknown
    /// position; only a short read is considered recoverable.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_display_is_hex() {
        let error = Error::ChecksumMismatch {
            expected: 0x0A,
            actual: 0xF0,
        };
        assert_eq!(
            error.to_string(),
            "Checksum mismatch: expected 0x0a, got 0xf0"
        );
    }

    #[test]
    fn test_only_timeout_is_recoverable() {
        assert!(Error::timeout(8, 3).is_recoverable());
        assert!(!Error::framing("bad start sentinel").is_recoverable());
        assert!(
            !Error::ChecksumMismatch {
                expected: 1,
                actual: 2
            }
            .is_recoverable()
        );
    }
}
