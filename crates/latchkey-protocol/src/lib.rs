//! Wire protocol of the fingerprint sensor and the JSON documents exchanged
//! with the access authority.
//!
//! - [`frame`]: building simple and data command frames
//! - [`codec`]: decoding sensor responses from a byte source
//! - [`commands`]: command and acknowledgement codes
//! - [`message`]: access requests and decision parsing
//!
//! # Examples
//!
//! ```
//! use latchkey_protocol::{CommandCode, SliceReader, decode_response, encode_simple};
//!
//! let frame = encode_simple(CommandCode::CompareOneToN, 0, 0, 0);
//! assert_eq!(frame.as_ref(), &[0xF5, 0x0C, 0, 0, 0, 0, 0x0C, 0xF5]);
//!
//! // A sensor echoing the frame decodes cleanly.
//! let mut reader = SliceReader::new(&frame);
//! let response = decode_response(&mut reader, false).unwrap();
//! assert_eq!(response.command, 0x0C);
//! ```

pub mod codec;
pub mod commands;
pub mod frame;
pub mod message;

pub use codec::{
    ByteReader, Response, SliceReader, decode_header, decode_response, read_data_frame,
};
pub use commands::{AckCode, CommandCode};
pub use frame::{checksum, encode_data, encode_simple};
pub use message::{AccessRequest, parse_decision};
