//! Wire-level and timing constants.
//!
//! The fingerprint sensor speaks a fixed-size binary protocol framed by a
//! sentinel byte. Every frame has one of two shapes:
//!
//! ```text
//! simple / header frame (8 bytes):
//!   F5 | CMD | P1 | P2 | P3 | 00 | CHK | F5
//!
//! data frame (LEN + 3 bytes):
//!   F5 | payload[0..LEN] | CHK | F5
//! ```
//!
//! `CHK` is the XOR of every byte between the opening sentinel and the
//! checksum itself. A data command sends a header whose `P1`/`P2` carry the
//! big-endian payload length, followed immediately by the data frame.
//!
//! # Usage
//!
//! ```
//! use latchkey_core::constants::*;
//! use std::time::Duration;
//!
//! assert_eq!(SENTINEL, 0xF5);
//! assert_eq!(PACKED_IMAGE_LEN, IMAGE_WIDTH * IMAGE_HEIGHT / 2);
//!
//! let window = Duration::from_millis(DEFAULT_RESPONSE_WINDOW_MS);
//! assert_eq!(window.as_secs(), 5);
//! ```

// ============================================================================
// Frame Layout
// ============================================================================

/// Opening and closing byte of every frame.
pub const SENTINEL: u8 = 0xF5;

/// Length of a simple command, a response header and a data command header.
pub const SIMPLE_FRAME_LEN: usize = 8;

/// Bytes a data frame adds around its payload (start sentinel, checksum, end sentinel).
pub const DATA_FRAME_OVERHEAD: usize = 3;

/// Largest payload a data frame can announce with its 16-bit length field.
pub const MAX_PAYLOAD_LEN: usize = 0xFFFF;

/// Index of the checksum byte inside an 8-byte frame.
pub const HEADER_CHECKSUM_INDEX: usize = 6;

/// Index of the acknowledgement byte inside a response header.
pub const HEADER_ACK_INDEX: usize = 4;

// ============================================================================
// Sensor Payloads
// ============================================================================

/// Length of a fingerprint eigenvalue (template) block.
pub const EIGENVALUE_LEN: usize = 193;

/// Minimum bytes that must be waiting before a continuous capture is decoded.
pub const CAPTURE_MIN_BYTES: usize = 198;

/// Width in pixels of a raw fingerprint image.
pub const IMAGE_WIDTH: usize = 124;

/// Height in pixels of a raw fingerprint image.
pub const IMAGE_HEIGHT: usize = 148;

/// Size of a packed 4-bit grayscale image (two pixels per byte).
pub const PACKED_IMAGE_LEN: usize = IMAGE_WIDTH * IMAGE_HEIGHT / 2;

/// Highest user id the sensor accepts.
pub const MAX_USER_ID: u16 = 0x0FFF;

/// Highest privilege level the sensor accepts.
pub const MAX_PRIVILEGE: u8 = 3;

// ============================================================================
// Serial Line
// ============================================================================

/// Default serial device of the sensor.
pub const DEFAULT_SERIAL_PORT: &str = "/dev/serial0";

/// Default baud rate of the sensor.
pub const DEFAULT_BAUD_RATE: u32 = 19_200;

/// Default bounded wait for a blocking read (ms).
pub const DEFAULT_READ_TIMEOUT_MS: u64 = 15_000;

/// Duration the reset line is held low (ms).
pub const RESET_PULSE_MS: u64 = 50;

/// Settle time after the reset line is released (ms).
pub const RESET_SETTLE_MS: u64 = 200;

// ============================================================================
// GPIO
// ============================================================================

/// BCM pin driving the door relay.
pub const DEFAULT_RELAY_PIN: u8 = 12;

/// BCM pin wired to the sensor reset line.
pub const DEFAULT_RESET_PIN: u8 = 18;

// ============================================================================
// Controller Timing
// ============================================================================

/// Window in which the authority must answer a request (ms).
pub const DEFAULT_RESPONSE_WINDOW_MS: u64 = 5_000;

/// How long the relay stays energized after an allow (ms).
pub const DEFAULT_UNLOCK_MS: u64 = 5_000;

/// Interval between decision slot checks while awaiting a decision (ms).
pub const DEFAULT_DECISION_POLL_MS: u64 = 200;

/// Interval between source polls while armed (ms).
pub const DEFAULT_IDLE_TICK_MS: u64 = 1_000;

/// Pause between camera frames in the QR capture task (ms).
pub const DEFAULT_QR_FRAME_INTERVAL_MS: u64 = 50;

// ============================================================================
// Messaging
// ============================================================================

/// Default broker host.
pub const DEFAULT_MQTT_HOST: &str = "localhost";

/// Default broker port.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Default MQTT quality of service for requests and the decision subscription.
pub const DEFAULT_MQTT_QOS: u8 = 1;

/// Default keep-alive interval (s).
pub const DEFAULT_MQTT_KEEP_ALIVE_SECS: u64 = 30;

/// Bound on a single publish (ms).
pub const DEFAULT_PUBLISH_TIMEOUT_MS: u64 = 2_000;

/// Door identifier used when none is configured.
pub const DEFAULT_DOOR_ID: &str = "main";

/// Prefix shared by the request and decision topics.
pub const TOPIC_PREFIX: &str = "access/door";
