use std::fmt;

use latchkey_core::{Error, Result};

/// Commands understood by the fingerprint sensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CommandCode {
    /// First of the three enrollment captures.
    AddFingerprint1 = 0x01,
    AddFingerprint2 = 0x02,
    AddFingerprint3 = 0x03,
    DeleteUser = 0x04,
    DeleteAll = 0x05,
    /// Verify the finger against one stored user.
    CompareOneToOne = 0x0B,
    /// Identify the finger among all stored users.
    CompareOneToN = 0x0C,
    /// Acquire a finger and return its eigenvalues. Also arms continuous capture.
    UploadEigenvalues = 0x23,
    /// Acquire a finger and return the packed raw image.
    UploadImage = 0x24,
    /// Put the sensor to sleep, aborting any pending acquisition.
    Sleep = 0x2C,
    /// Return the stored eigenvalues of one user.
    UploadUserEigenvalues = 0x31,
    /// Download eigenvalues and compare them against a live finger.
    DownloadEigenCompare = 0x44,
}

impl CommandCode {
    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Enrollment command for capture `step` (1 to 3).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidParameter`] for any other step.
    pub fn enroll_step(step: u8) -> Result<Self> {
        match step {
            1 => Ok(Self::AddFingerprint1),
            2 => Ok(Self::AddFingerprint2),
            3 => Ok(Self::AddFingerprint3),
            other => Err(Error::InvalidParameter(format!(
                "enroll step must be 1-3, got {other}"
            ))),
        }
    }
}

impl TryFrom<u8> for CommandCode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Ok(match value {
            0x01 => Self::AddFingerprint1,
            0x02 => Self::AddFingerprint2,
            0x03 => Self::AddFingerprint3,
            0x04 => Self::DeleteUser,
            0x05 => Self::DeleteAll,
            0x0B => Self::CompareOneToOne,
            0x0C => Self::CompareOneToN,
            0x23 => Self::UploadEigenvalues,
            0x24 => Self::UploadImage,
            0x2C => Self::Sleep,
            0x31 => Self::UploadUserEigenvalues,
            0x44 => Self::DownloadEigenCompare,
            other => {
                return Err(Error::InvalidParameter(format!(
                    "unknown command code {other:#04x}"
                )));
            }
        })
    }
}

impl From<CommandCode> for u8 {
    fn from(code: CommandCode) -> Self {
        code.as_u8()
    }
}

/// Acknowledgement byte of a sensor response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AckCode {
    Success,
    Fail,
    Full,
    NoUser,
    UserExists,
    FingerprintExists,
    Timeout,
    Other(u8),
}

impl AckCode {
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, AckCode::Success)
    }
}

impl From<u8> for AckCode {
    fn from(value: u8) -> Self {
        match value {
            0x00 => Self::Success,
            0x01 => Self::Fail,
            0x04 => Self::Full,
            0x05 => Self::NoUser,
            0x06 => Self::UserExists,
            0x07 => Self::FingerprintExists,
            0x08 => Self::Timeout,
            other => Self::Other(other),
        }
    }
}

impl From<AckCode> for u8 {
    fn from(ack: AckCode) -> Self {
        match ack {
            AckCode::Success => 0x00,
            AckCode::Fail => 0x01,
            AckCode::Full => 0x04,
            AckCode::NoUser => 0x05,
            AckCode::UserExists => 0x06,
            AckCode::FingerprintExists => 0x07,
            AckCode::Timeout => 0x08,
            AckCode::Other(other) => other,
        }
    }
}

impl fmt::Display for AckCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AckCode::Success => write!(f, "success"),
            AckCode::Fail => write!(f, "fail"),
            AckCode::Full => write!(f, "database full"),
            AckCode::NoUser => write!(f, "no such user"),
            AckCode::UserExists => write!(f, "user already exists"),
            AckCode::FingerprintExists => write!(f, "fingerprint already exists"),
            AckCode::Timeout => write!(f, "acquisition timeout"),
            AckCode::Other(code) => write!(f, "unknown ack {code:#04x}"),
        }
    }
}
