//! Fingerprint sensor driver.
//!
//! The driver owns the byte transport and, optionally, the GPIO line wired to
//! the sensor's reset input. It runs in one of two modes:
//!
//! - [`DriverMode::Idle`]: no acquisition outstanding. Maintenance commands
//!   (enroll, delete, identify, ...) are only accepted here.
//! - [`DriverMode::Scanning`]: a continuous capture has been armed and the
//!   driver waits for the sensor to push a template.
//!
//! ```text
//!            start_continuous_scan
//!   Idle ─────────────────────────▶ Scanning
//!    ▲                                 │
//!    └─── stop / capture / error ──────┘
//! ```
//!
//! # Examples
//!
//! ```
//! use latchkey_hardware::fingerprint::{DriverMode, FingerprintDriver};
//! use latchkey_hardware::mock::MockTransport;
//!
//! let (transport, _handle) = MockTransport::new();
//! let driver = FingerprintDriver::new(Box::new(transport));
//! assert_eq!(driver.mode(), DriverMode::Idle);
//! ```

use std::fmt;
use std::time::Duration;

use latchkey_core::constants::{
    CAPTURE_MIN_BYTES, DATA_FRAME_OVERHEAD, MAX_PRIVILEGE, MAX_USER_ID, RESET_PULSE_MS,
    RESET_SETTLE_MS, SIMPLE_FRAME_LEN,
};
use latchkey_protocol::{
    AckCode, ByteReader, CommandCode, Response, decode_header, decode_response, encode_data,
    encode_simple, read_data_frame,
};
use tracing::{debug, info, trace, warn};

use crate::error::{HardwareError, Result};
use crate::traits::{ByteTransport, OutputPin, PinLevel};

/// Level the sensor's reset input rests at outside a reset pulse.
pub const RESET_IDLE_LEVEL: PinLevel = PinLevel::High;

/// Operating mode of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverMode {
    Idle,
    Scanning,
}

/// A user matched by 1:N identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Identification {
    pub user_id: u16,
    pub privilege: u8,
}

/// Adapter feeding transport reads into the frame decoder.
struct TransportReader<'a>(&'a mut dyn ByteTransport);

impl ByteReader for TransportReader<'_> {
    fn read_exact(&mut self, buf: &mut [u8]) -> latchkey_core::Result<()> {
        self.0.read_exact(buf)
    }
}

/// Driver for the serial fingerprint sensor.
pub struct FingerprintDriver {
    transport: Box<dyn ByteTransport>,
    reset: Option<Box<dyn OutputPin>>,
    mode: DriverMode,
    /// Header of a successful capture whose data frame is still arriving.
    capture_header: Option<Response>,
    capture_min_bytes: usize,
}

impl fmt::Debug for FingerprintDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FingerprintDriver")
            .field("mode", &self.mode)
            .field("header_pending", &self.capture_header.is_some())
            .field("has_reset_line", &self.reset.is_some())
            .field("capture_min_bytes", &self.capture_min_bytes)
            .finish()
    }
}

impl FingerprintDriver {
    /// Create an idle driver over `transport`.
    pub fn new(transport: Box<dyn ByteTransport>) -> Self {
        Self {
            transport,
            reset: None,
            mode: DriverMode::Idle,
            capture_header: None,
            capture_min_bytes: CAPTURE_MIN_BYTES,
        }
    }

    /// Attach the GPIO line wired to the sensor's reset input.
    #[must_use]
    pub fn with_reset_pin(mut self, pin: Box<dyn OutputPin>) -> Self {
        self.reset = Some(pin);
        self
    }

    /// Override how many reply bytes must have arrived before a template is
    /// decoded.
    #[must_use]
    pub fn with_capture_min_bytes(mut self, bytes: usize) -> Self {
        self.capture_min_bytes = bytes;
        self
    }

    pub fn mode(&self) -> DriverMode {
        self.mode
    }

    /// Pulse the reset line and wait for the sensor to settle.
    ///
    /// Without a reset line this only discards pending input.
    pub async fn hardware_reset(&mut self) -> Result<()> {
        if let Some(pin) = self.reset.as_mut() {
            debug!("pulsing sensor reset line");
            pin.set_low()?;
            tokio::time::sleep(Duration::from_millis(RESET_PULSE_MS)).await;
            pin.set_high()?;
            tokio::time::sleep(Duration::from_millis(RESET_SETTLE_MS)).await;
        }
        self.transport.clear_input()?;
        Ok(())
    }

    /// Reset the sensor and arm continuous acquisition.
    ///
    /// Calling this while already scanning restarts the scan.
    pub async fn start_continuous_scan(&mut self) -> Result<()> {
        if self.mode == DriverMode::Scanning {
            debug!("continuous scan already active, restarting");
        }
        self.set_idle();

        self.hardware_reset().await?;
        self.transport
            .write_all(&encode_simple(CommandCode::UploadEigenvalues, 0, 0, 0))?;
        self.mode = DriverMode::Scanning;

        info!("fingerprint continuous scan armed");
        Ok(())
    }

    /// Check for a completed capture.
    ///
    /// Returns `None` when idle or while the reply is incomplete. The header
    /// is decoded as soon as its 8 bytes are waiting: a failure
    /// acknowledgement (no finger within the sensor's timeout, bad capture)
    /// ends the scan with `None` so the caller re-arms. After a successful
    /// header the template is decoded once the reply has reached the minimum
    /// capture size, or earlier if the whole data frame is already waiting.
    ///
    /// A decoded template returns the driver to idle, as does any error:
    /// after a framing or checksum failure the stream position is unknown and
    /// the scan must be restarted.
    pub async fn poll_capture(&mut self, min_wait: Duration) -> Result<Option<Vec<u8>>> {
        if !min_wait.is_zero() {
            tokio::time::sleep(min_wait).await;
        }
        if self.mode != DriverMode::Scanning {
            return Ok(None);
        }

        let result = self.advance_capture();
        if result.is_err() {
            self.set_idle();
        }
        result
    }

    fn advance_capture(&mut self) -> Result<Option<Vec<u8>>> {
        let mut available = self.transport.bytes_available()?;

        let header = match self.capture_header.take() {
            Some(header) => header,
            None => {
                if available < SIMPLE_FRAME_LEN {
                    trace!(available, "capture header not ready");
                    return Ok(None);
                }
                let mut reader = TransportReader(self.transport.as_mut());
                let header = decode_header(&mut reader)?;
                expect_command(&header, CommandCode::UploadEigenvalues)?;
                available -= SIMPLE_FRAME_LEN;

                let ack = header.ack();
                if !ack.is_success() {
                    warn!(%ack, "capture ended without template");
                    self.set_idle();
                    return Ok(None);
                }
                header
            }
        };

        let length = usize::from(header.high_word());
        let frame_len = length + DATA_FRAME_OVERHEAD;
        let needed = self
            .capture_min_bytes
            .saturating_sub(SIMPLE_FRAME_LEN)
            .clamp(DATA_FRAME_OVERHEAD, frame_len);
        if available < needed {
            trace!(available, needed, "capture template not ready");
            self.capture_header = Some(header);
            return Ok(None);
        }

        self.set_idle();
        let mut reader = TransportReader(self.transport.as_mut());
        let template = read_data_frame(&mut reader, length)?;
        debug!(len = template.len(), "fingerprint captured");
        Ok(Some(template))
    }

    /// Put the sensor to sleep, aborting any acquisition.
    ///
    /// The driver is idle afterwards even if the command could not be sent.
    pub fn stop(&mut self) -> Result<()> {
        let was_scanning = self.mode == DriverMode::Scanning;
        self.set_idle();
        self.transport
            .write_all(&encode_simple(CommandCode::Sleep, 0, 0, 0))?;
        self.transport.clear_input()?;
        if was_scanning {
            info!("fingerprint continuous scan stopped");
        }
        Ok(())
    }

    /// Run one of the three enrollment captures for `user_id`.
    pub fn enroll_step(&mut self, step: u8, user_id: u16, privilege: u8) -> Result<AckCode> {
        let command = CommandCode::enroll_step(step)?;
        validate_user_id(user_id)?;
        validate_privilege(privilege)?;
        let [hi, lo] = user_id.to_be_bytes();
        let response = self.exchange(&encode_simple(command, hi, lo, privilege), command, false)?;
        Ok(response.ack())
    }

    /// Enroll a user with the three captures the sensor requires.
    ///
    /// `on_step` is called before each capture so the caller can prompt for
    /// the finger. Stops at the first non-success acknowledgement.
    pub fn enroll_user(
        &mut self,
        user_id: u16,
        privilege: u8,
        mut on_step: impl FnMut(u8),
    ) -> Result<AckCode> {
        for step in 1..=3 {
            on_step(step);
            let ack = self.enroll_step(step, user_id, privilege)?;
            if !ack.is_success() {
                warn!(user_id, step, %ack, "enrollment aborted");
                return Ok(ack);
            }
        }
        info!(user_id, privilege, "user enrolled");
        Ok(AckCode::Success)
    }

    pub fn delete_user(&mut self, user_id: u16) -> Result<AckCode> {
        validate_user_id(user_id)?;
        let [hi, lo] = user_id.to_be_bytes();
        let response = self.exchange(
            &encode_simple(CommandCode::DeleteUser, hi, lo, 0),
            CommandCode::DeleteUser,
            false,
        )?;
        Ok(response.ack())
    }

    pub fn delete_all(&mut self) -> Result<AckCode> {
        let response = self.exchange(
            &encode_simple(CommandCode::DeleteAll, 0, 0, 0),
            CommandCode::DeleteAll,
            false,
        )?;
        Ok(response.ack())
    }

    /// Verify a live finger against `user_id`.
    pub fn compare_one_to_one(&mut self, user_id: u16) -> Result<AckCode> {
        validate_user_id(user_id)?;
        let [hi, lo] = user_id.to_be_bytes();
        let response = self.exchange(
            &encode_simple(CommandCode::CompareOneToOne, hi, lo, 0),
            CommandCode::CompareOneToOne,
            false,
        )?;
        Ok(response.ack())
    }

    /// Identify a live finger among all enrolled users.
    ///
    /// Returns `None` when no enrolled user matches.
    pub fn identify(&mut self) -> Result<Option<Identification>> {
        let response = self.exchange(
            &encode_simple(CommandCode::CompareOneToN, 0, 0, 0),
            CommandCode::CompareOneToN,
            false,
        )?;

        // Byte 4 is the privilege on a match and an ack code otherwise.
        match response.params[2] {
            privilege @ 1..=MAX_PRIVILEGE => Ok(Some(Identification {
                user_id: response.high_word(),
                privilege,
            })),
            _ => match response.ack() {
                AckCode::NoUser => Ok(None),
                ack => Err(HardwareError::Rejected { ack }),
            },
        }
    }

    /// Acquire a finger and return its eigenvalue block.
    pub fn capture_eigenvalues(&mut self) -> Result<Vec<u8>> {
        self.capture(CommandCode::UploadEigenvalues)
    }

    /// Acquire a finger and return the packed 4-bit image.
    pub fn capture_image(&mut self) -> Result<Vec<u8>> {
        self.capture(CommandCode::UploadImage)
    }

    /// Stored eigenvalue block of `user_id`.
    pub fn upload_user_eigenvalues(&mut self, user_id: u16) -> Result<Vec<u8>> {
        validate_user_id(user_id)?;
        let [hi, lo] = user_id.to_be_bytes();
        let response = self.exchange(
            &encode_simple(CommandCode::UploadUserEigenvalues, hi, lo, 0),
            CommandCode::UploadUserEigenvalues,
            true,
        )?;
        let ack = response.ack();
        response.payload.ok_or(HardwareError::Rejected { ack })
    }

    /// Send an eigenvalue block and compare it against a live finger.
    pub fn download_and_compare(&mut self, eigenvalues: &[u8]) -> Result<AckCode> {
        let frame = encode_data(CommandCode::DownloadEigenCompare, eigenvalues)?;
        let response = self.exchange(&frame, CommandCode::DownloadEigenCompare, false)?;
        Ok(response.ack())
    }

    fn capture(&mut self, command: CommandCode) -> Result<Vec<u8>> {
        let response = self.exchange(&encode_simple(command, 0, 0, 0), command, true)?;
        let ack = response.ack();
        response.payload.ok_or(HardwareError::Rejected { ack })
    }

    fn exchange(
        &mut self,
        frame: &[u8],
        command: CommandCode,
        expect_payload: bool,
    ) -> Result<Response> {
        if self.mode != DriverMode::Idle {
            return Err(HardwareError::invalid_state(
                "sensor is scanning; stop the continuous scan first",
            ));
        }
        self.transport.clear_input()?;
        self.transport.write_all(frame)?;
        self.read_response(command, expect_payload)
    }

    fn read_response(&mut self, command: CommandCode, expect_payload: bool) -> Result<Response> {
        let mut reader = TransportReader(self.transport.as_mut());
        let response = decode_response(&mut reader, expect_payload)?;
        expect_command(&response, command)?;
        Ok(response)
    }

    fn set_idle(&mut self) {
        self.mode = DriverMode::Idle;
        self.capture_header = None;
    }
}

fn expect_command(response: &Response, command: CommandCode) -> Result<()> {
    if response.command != command.as_u8() {
        return Err(latchkey_core::Error::UnexpectedResponse {
            expected: command.as_u8(),
            actual: response.command,
        }
        .into());
    }
    Ok(())
}

fn validate_user_id(user_id: u16) -> Result<()> {
    if !(1..=MAX_USER_ID).contains(&user_id) {
        return Err(latchkey_core::Error::InvalidParameter(format!(
            "user id must be 1-{MAX_USER_ID}, got {user_id}"
        ))
        .into());
    }
    Ok(())
}

fn validate_privilege(privilege: u8) -> Result<()> {
    if !(1..=MAX_PRIVILEGE).contains(&privilege) {
        return Err(latchkey_core::Error::InvalidParameter(format!(
            "privilege must be 1-{MAX_PRIVILEGE}, got {privilege}"
        ))
        .into());
    }
    Ok(())
}

/// Expand a packed 4-bit image into one byte per pixel.
///
/// Each input byte holds two pixels: the low nibble is the first pixel and
/// the high nibble the second. Nibbles are scaled to 8 bits by shifting left.
///
/// # Errors
///
/// Returns [`HardwareError::InvalidLength`] if `raw` is not exactly
/// `width * height / 2` bytes, the pixel count is odd or it does not fit in
/// `usize`.
///
/// # Examples
///
/// ```
/// use latchkey_hardware::fingerprint::unpack_image;
///
/// let pixels = unpack_image(&[0x21, 0xF0], 2, 2).unwrap();
/// assert_eq!(pixels, vec![0x10, 0x20, 0x00, 0xF0]);
/// ```
pub fn unpack_image(raw: &[u8], width: usize, height: usize) -> Result<Vec<u8>> {
    let Some(pixels) = width.checked_mul(height) else {
        return Err(HardwareError::InvalidLength {
            expected: usize::MAX,
            actual: raw.len(),
        });
    };
    if pixels % 2 != 0 || raw.len() != pixels / 2 {
        return Err(HardwareError::InvalidLength {
            expected: pixels / 2,
            actual: raw.len(),
        });
    }

    let mut image = Vec::with_capacity(pixels);
    for byte in raw {
        image.push((byte & 0x0F) << 4);
        image.push(byte & 0xF0);
    }
    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockPin, MockTransport, PinLevel};
    use latchkey_core::constants::{IMAGE_HEIGHT, IMAGE_WIDTH, PACKED_IMAGE_LEN, SENTINEL};
    use latchkey_protocol::checksum;
    use rstest::rstest;

    fn header(command: u8, q1: u8, q2: u8, q3: u8) -> Vec<u8> {
        let mut frame = vec![SENTINEL, command, q1, q2, q3, 0, 0, SENTINEL];
        frame[6] = checksum(&frame[1..6]);
        frame
    }

    fn data_reply(command: u8, payload: &[u8]) -> Vec<u8> {
        let [hi, lo] = (payload.len() as u16).to_be_bytes();
        let mut bytes = header(command, hi, lo, 0);
        bytes.push(SENTINEL);
        bytes.extend_from_slice(payload);
        bytes.push(checksum(payload));
        bytes.push(SENTINEL);
        bytes
    }

    fn template() -> Vec<u8> {
        (0..196u16).map(|i| (i % 256) as u8).collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_scan_pulses_reset_and_sends_capture_command() {
        let (transport, transport_handle) = MockTransport::new();
        let (pin, pin_handle) = MockPin::new("reset");
        let mut driver = FingerprintDriver::new(Box::new(transport)).with_reset_pin(Box::new(pin));

        transport_handle.feed(&[0xAA, 0xBB]);
        driver.start_continuous_scan().await.unwrap();

        assert_eq!(driver.mode(), DriverMode::Scanning);
        assert_eq!(pin_handle.levels(), vec![PinLevel::Low, PinLevel::High]);
        assert_eq!(
            transport_handle.writes(),
            vec![vec![0xF5, 0x23, 0, 0, 0, 0, 0x23, 0xF5]]
        );
        // Stale input from before the reset is gone.
        assert_eq!(transport_handle.pending_input(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_pulse_returns_line_to_idle_level() {
        let (transport, _transport_handle) = MockTransport::new();
        let (pin, pin_handle) = MockPin::new("reset");
        let mut driver = FingerprintDriver::new(Box::new(transport)).with_reset_pin(Box::new(pin));

        driver.hardware_reset().await.unwrap();
        assert_eq!(pin_handle.levels().last(), Some(&RESET_IDLE_LEVEL));
        assert_ne!(pin_handle.levels()[0], RESET_IDLE_LEVEL);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_capture_returns_none_below_threshold() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        let reply = data_reply(0x23, &template());
        handle.feed(&reply[..100]);

        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), None);
        assert_eq!(driver.mode(), DriverMode::Scanning);
        // The header is taken, the partial data frame stays queued.
        assert_eq!(handle.pending_input(), 92);

        handle.feed(&reply[100..]);
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), Some(template()));
        assert_eq!(driver.mode(), DriverMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_capture_waits_for_full_header() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        handle.feed(&header(0x23, 0, 0, 0x08)[..5]);
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), None);
        assert_eq!(driver.mode(), DriverMode::Scanning);
        assert_eq!(handle.pending_input(), 5);
    }

    #[rstest]
    #[case::timeout(0x08)]
    #[case::fail(0x01)]
    #[tokio::test(start_paused = true)]
    async fn test_failure_ack_ends_scan(#[case] ack: u8) {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        handle.feed(&header(0x23, 0, 0, ack));
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), None);
        assert_eq!(driver.mode(), DriverMode::Idle);
        assert_eq!(handle.pending_input(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_template_is_decoded() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        handle.feed(&data_reply(0x23, &[]));
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), Some(vec![]));
        assert_eq!(handle.pending_input(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_drops_pending_header() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        handle.feed(&data_reply(0x23, &template())[..50]);
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), None);

        driver.start_continuous_scan().await.unwrap();
        handle.feed(&data_reply(0x23, &template()));
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), Some(template()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_capture_decodes_template_once() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        handle.feed(&data_reply(0x23, &template()));

        let captured = driver.poll_capture(Duration::ZERO).await.unwrap();
        assert_eq!(captured, Some(template()));
        assert_eq!(driver.mode(), DriverMode::Idle);
        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_capture_when_idle_touches_nothing() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        handle.feed(&data_reply(0x23, &template()));

        assert_eq!(driver.poll_capture(Duration::ZERO).await.unwrap(), None);
        assert!(handle.pending_input() > 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupted_capture_surfaces_and_idles() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        let mut reply = data_reply(0x23, &template());
        reply[20] ^= 0x01;
        handle.feed(&reply);

        let result = driver.poll_capture(Duration::ZERO).await;
        assert!(matches!(
            result,
            Err(HardwareError::Protocol(latchkey_core::Error::ChecksumMismatch { .. }))
        ));
        assert_eq!(driver.mode(), DriverMode::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_sends_sleep_and_idles() {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        driver.stop().unwrap();
        assert_eq!(driver.mode(), DriverMode::Idle);
        assert_eq!(
            handle.writes().last().unwrap(),
            &vec![0xF5, 0x2C, 0, 0, 0, 0, 0x2C, 0xF5]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_rejected_while_scanning() {
        let (transport, _handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));
        driver.start_continuous_scan().await.unwrap();

        assert!(matches!(
            driver.delete_all(),
            Err(HardwareError::InvalidState { .. })
        ));
    }

    #[test]
    fn test_enroll_user_runs_three_steps() {
        let (transport, handle) = MockTransport::new();
        for command in [0x01, 0x02, 0x03] {
            handle.reply_on_write(&header(command, 0, 0, 0x00));
        }
        let mut driver = FingerprintDriver::new(Box::new(transport));

        let mut prompts = Vec::new();
        let ack = driver.enroll_user(0x123, 1, |step| prompts.push(step)).unwrap();

        assert_eq!(ack, AckCode::Success);
        assert_eq!(prompts, vec![1, 2, 3]);
        let writes = handle.writes();
        assert_eq!(writes.len(), 3);
        assert_eq!(&writes[0][1..5], &[0x01, 0x01, 0x23, 0x01]);
        assert_eq!(writes[2][1], 0x03);
    }

    #[test]
    fn test_enroll_user_stops_on_duplicate() {
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&header(0x01, 0, 0, 0x00));
        handle.reply_on_write(&header(0x02, 0, 0, 0x07));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        let ack = driver.enroll_user(7, 1, |_| {}).unwrap();
        assert_eq!(ack, AckCode::FingerprintExists);
        assert_eq!(handle.writes().len(), 2);
    }

    #[rstest]
    #[case(0, 1)]
    #[case(0x1000, 1)]
    #[case(1, 0)]
    #[case(1, 4)]
    fn test_enroll_parameters_validated_before_encoding(#[case] user_id: u16, #[case] privilege: u8) {
        let (transport, handle) = MockTransport::new();
        let mut driver = FingerprintDriver::new(Box::new(transport));

        let result = driver.enroll_step(1, user_id, privilege);
        assert!(matches!(
            result,
            Err(HardwareError::Protocol(latchkey_core::Error::InvalidParameter(_)))
        ));
        assert!(handle.writes().is_empty());
    }

    #[test]
    fn test_identify_match() {
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&header(0x0C, 0x00, 0x2A, 0x02));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        assert_eq!(
            driver.identify().unwrap(),
            Some(Identification {
                user_id: 42,
                privilege: 2
            })
        );
    }

    #[test]
    fn test_identify_no_user_and_timeout() {
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&header(0x0C, 0, 0, 0x05));
        handle.reply_on_write(&header(0x0C, 0, 0, 0x08));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        assert_eq!(driver.identify().unwrap(), None);
        assert!(matches!(
            driver.identify(),
            Err(HardwareError::Rejected { ack: AckCode::Timeout })
        ));
    }

    #[test]
    fn test_unexpected_reply_command() {
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&header(0x05, 0, 0, 0));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        assert!(matches!(
            driver.delete_user(3),
            Err(HardwareError::Protocol(latchkey_core::Error::UnexpectedResponse {
                expected: 0x04,
                actual: 0x05
            }))
        ));
    }

    #[test]
    fn test_capture_image_and_unpack() {
        let packed: Vec<u8> = (0..PACKED_IMAGE_LEN).map(|i| (i % 256) as u8).collect();
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&data_reply(0x24, &packed));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        let raw = driver.capture_image().unwrap();
        let image = unpack_image(&raw, IMAGE_WIDTH, IMAGE_HEIGHT).unwrap();
        assert_eq!(image.len(), IMAGE_WIDTH * IMAGE_HEIGHT);
        assert_eq!(&image[2..4], &[0x10, 0x00]);
    }

    #[test]
    fn test_capture_without_payload_is_rejected() {
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&header(0x23, 0, 0, 0x08));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        assert!(matches!(
            driver.capture_eigenvalues(),
            Err(HardwareError::Rejected { ack: AckCode::Timeout })
        ));
    }

    #[test]
    fn test_download_and_compare_sends_data_frame() {
        let (transport, handle) = MockTransport::new();
        handle.reply_on_write(&header(0x44, 0, 0, 0x00));
        let mut driver = FingerprintDriver::new(Box::new(transport));

        let block = template();
        assert_eq!(driver.download_and_compare(&block).unwrap(), AckCode::Success);

        let sent = &handle.writes()[0];
        assert_eq!(sent.len(), 8 + block.len() + 3);
        assert_eq!(&sent[2..4], &[0x00, 0xC4]);
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        let result = unpack_image(&[0u8; 10], IMAGE_WIDTH, IMAGE_HEIGHT);
        assert!(matches!(
            result,
            Err(HardwareError::InvalidLength { expected: 9176, actual: 10 })
        ));
    }

    #[test]
    fn test_unpack_rejects_odd_pixel_count() {
        assert!(unpack_image(&[0u8; 4], 3, 3).is_err());
    }

    #[test]
    fn test_unpack_rejects_overflowing_dimensions() {
        assert!(matches!(
            unpack_image(&[0u8; 4], usize::MAX, 2),
            Err(HardwareError::InvalidLength { actual: 4, .. })
        ));
    }
}
