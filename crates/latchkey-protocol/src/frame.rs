//! Command frame construction.
//!
//! # Wire Format
//!
//! ```text
//! simple command  F5 CMD P1 P2 P3 00 CHK F5
//! data command    F5 CMD LH LL 00 00 CHK F5   F5 payload.. CHK F5
//! ```
//!
//! `CHK` is the XOR of the bytes between the opening sentinel and the
//! checksum position. `LH`/`LL` are the big-endian payload length.

use bytes::{BufMut, Bytes, BytesMut};
use latchkey_core::constants::{DATA_FRAME_OVERHEAD, MAX_PAYLOAD_LEN, SENTINEL, SIMPLE_FRAME_LEN};
use latchkey_core::{Error, Result};

use crate::commands::CommandCode;

/// XOR of all bytes.
///
/// Used for both the header checksum (over bytes 1 to 5) and the payload
/// checksum of a data frame.
///
/// # Examples
///
/// ```
/// use latchkey_protocol::checksum;
///
/// assert_eq!(checksum(&[]), 0);
/// assert_eq!(checksum(&[0x23, 0x00, 0xC1]), 0xE2);
/// ```
#[must_use]
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0, |acc, b| acc ^ b)
}

fn header(command: u8, p1: u8, p2: u8, p3: u8) -> [u8; SIMPLE_FRAME_LEN] {
    let mut frame = [SENTINEL, command, p1, p2, p3, 0x00, 0x00, SENTINEL];
    frame[6] = checksum(&frame[1..6]);
    frame
}

/// Build an 8-byte simple command frame.
///
/// Parameter ranges are the caller's concern: a user id or privilege level
/// must be validated before it is split into parameter bytes.
///
/// # Examples
///
/// ```
/// use latchkey_protocol::{CommandCode, encode_simple};
///
/// let frame = encode_simple(CommandCode::DeleteUser, 0x00, 0x2A, 0x00);
/// assert_eq!(frame.len(), 8);
/// assert_eq!(frame[6], 0x04 ^ 0x2A);
/// ```
#[must_use]
pub fn encode_simple(command: CommandCode, p1: u8, p2: u8, p3: u8) -> Bytes {
    Bytes::copy_from_slice(&header(command.as_u8(), p1, p2, p3))
}

/// Build a data command: an 8-byte header announcing the payload length,
/// followed by the data frame carrying the payload.
///
/// # Errors
///
/// Returns [`Error::PayloadTooLarge`] if the payload does not fit the
/// 16-bit length field.
///
/// # Examples
///
/// ```
/// use latchkey_protocol::{CommandCode, encode_data};
///
/// let frame = encode_data(CommandCode::DownloadEigenCompare, &[0x01, 0x02]).unwrap();
/// assert_eq!(frame.len(), 8 + 2 + 3);
/// assert_eq!(&frame[8..], &[0xF5, 0x01, 0x02, 0x03, 0xF5]);
/// ```
pub fn encode_data(command: CommandCode, payload: &[u8]) -> Result<Bytes> {
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(Error::PayloadTooLarge {
            len: payload.len(),
            max: MAX_PAYLOAD_LEN,
        });
    }

    let [len_hi, len_lo] = (payload.len() as u16).to_be_bytes();
    let mut buffer =
        BytesMut::with_capacity(SIMPLE_FRAME_LEN + payload.len() + DATA_FRAME_OVERHEAD);
    buffer.put_slice(&header(command.as_u8(), len_hi, len_lo, 0x00));
    buffer.put_u8(SENTINEL);
    buffer.put_slice(payload);
    buffer.put_u8(checksum(payload));
    buffer.put_u8(SENTINEL);

    Ok(buffer.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_sleep_frame_bytes() {
        let frame = encode_simple(CommandCode::Sleep, 0, 0, 0);
        assert_eq!(frame.as_ref(), &[0xF5, 0x2C, 0, 0, 0, 0, 0x2C, 0xF5]);
    }

    #[rstest]
    #[case(0x01, 0x23, 0x01)]
    #[case(0x0F, 0xFF, 0x03)]
    #[case(0x00, 0x01, 0x02)]
    fn test_enroll_frame_checksum(#[case] hi: u8, #[case] lo: u8, #[case] privilege: u8) {
        let frame = encode_simple(CommandCode::AddFingerprint1, hi, lo, privilege);
        assert_eq!(frame[0], SENTINEL);
        assert_eq!(frame[7], SENTINEL);
        assert_eq!(frame[5], 0x00);
        assert_eq!(frame[6], 0x01 ^ hi ^ lo ^ privilege);
    }

    #[test]
    fn test_data_header_announces_length() {
        let payload = vec![0xAB; 0x0123];
        let frame = encode_data(CommandCode::DownloadEigenCompare, &payload).unwrap();

        assert_eq!(frame.len(), SIMPLE_FRAME_LEN + payload.len() + DATA_FRAME_OVERHEAD);
        assert_eq!(&frame[..6], &[0xF5, 0x44, 0x01, 0x23, 0x00, 0x00]);
        assert_eq!(frame[6], 0x44 ^ 0x01 ^ 0x23);
        assert_eq!(frame[8], SENTINEL);
        assert_eq!(frame[frame.len() - 2], checksum(&payload));
        assert_eq!(frame[frame.len() - 1], SENTINEL);
    }

    #[test]
    fn test_empty_data_frame() {
        let frame = encode_data(CommandCode::DownloadEigenCompare, &[]).unwrap();
        assert_eq!(&frame[8..], &[0xF5, 0x00, 0xF5]);
        assert_eq!(&frame[2..4], &[0x00, 0x00]);
    }

    #[test]
    fn test_max_payload_accepted() {
        let payload = vec![0x11; MAX_PAYLOAD_LEN];
        let frame = encode_data(CommandCode::DownloadEigenCompare, &payload).unwrap();
        assert_eq!(&frame[2..4], &[0xFF, 0xFF]);
    }

    #[test]
    fn test_oversized_payload_rejected() {
        let payload = vec![0x11; MAX_PAYLOAD_LEN + 1];
        let result = encode_data(CommandCode::DownloadEigenCompare, &payload);
        assert!(matches!(
            result,
            Err(Error::PayloadTooLarge { len: 65_536, max: 65_535 })
        ));
    }
}
