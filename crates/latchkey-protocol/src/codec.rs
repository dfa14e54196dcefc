//! Response decoding.
//!
//! The sensor answers every command with an 8-byte header. When the header
//! announces a payload, a data frame follows. Decoding pulls bytes through a
//! [`ByteReader`] so that the same logic serves a serial port, a mock
//! transport or an in-memory slice.

use latchkey_core::constants::{
    HEADER_ACK_INDEX, HEADER_CHECKSUM_INDEX, SENTINEL, SIMPLE_FRAME_LEN,
};
use latchkey_core::{Error, Result};

use crate::commands::AckCode;
use crate::frame::checksum;

/// Source of bytes for [`decode_response`].
///
/// `read_exact` fills the whole buffer or fails. A short read within the
/// source's bounded wait must surface as [`Error::Timeout`].
pub trait ByteReader {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()>;
}

impl<F> ByteReader for F
where
    F: FnMut(&mut [u8]) -> Result<()>,
{
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        self(buf)
    }
}

/// [`ByteReader`] over an in-memory buffer.
#[derive(Debug, Clone)]
pub struct SliceReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> SliceReader<'a> {
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes not yet consumed.
    #[must_use]
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }
}

impl ByteReader for SliceReader<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let available = self.data.len() - self.position;
        if available < buf.len() {
            self.position = self.data.len();
            return Err(Error::timeout(buf.len(), available));
        }
        buf.copy_from_slice(&self.data[self.position..self.position + buf.len()]);
        self.position += buf.len();
        Ok(())
    }
}

/// A decoded sensor response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Command byte echoed by the sensor.
    pub command: u8,
    /// Header bytes 2 to 4.
    pub params: [u8; 3],
    /// Payload of the trailing data frame, if one was announced.
    pub payload: Option<Vec<u8>>,
}

impl Response {
    /// Acknowledgement carried in header byte 4.
    #[must_use]
    pub fn ack(&self) -> AckCode {
        AckCode::from(self.params[HEADER_ACK_INDEX - 2])
    }

    /// Big-endian value of header bytes 2 and 3.
    ///
    /// This is the payload length for data responses and a user id for
    /// identification replies.
    #[must_use]
    pub fn high_word(&self) -> u16 {
        u16::from_be_bytes([self.params[0], self.params[1]])
    }
}

/// Decode one response from `reader`.
///
/// Sentinels are checked before the header checksum. When `expect_payload`
/// is set and the header acknowledges success, bytes 2 and 3 are read as the
/// payload length and the data frame is pulled in, even for an empty
/// payload. A failure acknowledgement is never followed by data. Without
/// `expect_payload` the bytes are left as plain parameters.
///
/// # Errors
///
/// - [`Error::Framing`] if a sentinel byte is wrong
/// - [`Error::ChecksumMismatch`] if the header or payload checksum fails
/// - any error of the reader, [`Error::Timeout`] in particular, unchanged
///
/// After a framing or checksum failure the position in the byte stream is
/// unknown and the exchange must be abandoned.
///
/// # Examples
///
/// ```
/// use latchkey_protocol::{SliceReader, decode_response};
///
/// let bytes = [0xF5, 0x23, 0x00, 0x02, 0x00, 0x00, 0x21, 0xF5, 0xF5, 0x10, 0x20, 0x30, 0xF5];
/// let response = decode_response(&mut SliceReader::new(&bytes), true).unwrap();
/// assert_eq!(response.payload.as_deref(), Some(&[0x10, 0x20][..]));
/// ```
pub fn decode_response<R: ByteReader + ?Sized>(
    reader: &mut R,
    expect_payload: bool,
) -> Result<Response> {
    let mut response = decode_header(reader)?;
    if expect_payload && response.ack().is_success() {
        let length = usize::from(response.high_word());
        response.payload = Some(read_data_frame(reader, length)?);
    }
    Ok(response)
}

/// Decode only the 8-byte header of a response.
///
/// The returned response never carries a payload. Use [`read_data_frame`]
/// to pull in the data frame a successful data reply announces.
pub fn decode_header<R: ByteReader + ?Sized>(reader: &mut R) -> Result<Response> {
    let mut header = [0u8; SIMPLE_FRAME_LEN];
    reader.read_exact(&mut header)?;

    if header[0] != SENTINEL || header[SIMPLE_FRAME_LEN - 1] != SENTINEL {
        return Err(Error::framing(format!(
            "header sentinels {:#04x}/{:#04x}",
            header[0],
            header[SIMPLE_FRAME_LEN - 1]
        )));
    }

    let expected = checksum(&header[1..HEADER_CHECKSUM_INDEX]);
    if header[HEADER_CHECKSUM_INDEX] != expected {
        return Err(Error::ChecksumMismatch {
            expected,
            actual: header[HEADER_CHECKSUM_INDEX],
        });
    }

    Ok(Response {
        command: header[1],
        params: [header[2], header[3], header[4]],
        payload: None,
    })
}

/// Read a `[F5, payload.., CHK, F5]` data frame of `length` payload bytes.
pub fn read_data_frame<R: ByteReader + ?Sized>(reader: &mut R, length: usize) -> Result<Vec<u8>> {
    let mut start = [0u8; 1];
    reader.read_exact(&mut start)?;
    if start[0] != SENTINEL {
        return Err(Error::framing(format!(
            "data frame start sentinel {:#04x}",
            start[0]
        )));
    }

    let mut payload = vec![0u8; length];
    reader.read_exact(&mut payload)?;

    let mut tail = [0u8; 2];
    reader.read_exact(&mut tail)?;

    let expected = checksum(&payload);
    if tail[0] != expected {
        return Err(Error::ChecksumMismatch {
            expected,
            actual: tail[0],
        });
    }
    if tail[1] != SENTINEL {
        return Err(Error::framing(format!(
            "data frame end sentinel {:#04x}",
            tail[1]
        )));
    }

    Ok(payload)
}
