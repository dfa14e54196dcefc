//! Serial port transport for the fingerprint sensor.

use std::io::{ErrorKind, Read, Write};
use std::time::{Duration, Instant};

use latchkey_core::config::SerialConfig;
use latchkey_core::Error;
use serialport::{ClearBuffer, SerialPort};
use tracing::{debug, trace};

use crate::error::{HardwareError, Result};
use crate::traits::ByteTransport;

/// [`ByteTransport`] over a local serial device.
pub struct SerialTransport {
    port: Box<dyn SerialPort>,
    path: String,
    read_timeout: Duration,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("path", &self.path)
            .field("read_timeout", &self.read_timeout)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open the port described by `config` (8N1, no flow control).
    pub fn open(config: &SerialConfig) -> Result<Self> {
        // Short per-call timeout; the bounded wait is enforced in read_exact.
        let port = serialport::new(&config.port, config.baud_rate)
            .timeout(Duration::from_millis(50))
            .open()
            .map_err(|e| {
                HardwareError::initialization_failed(format!("{}: {e}", config.port))
            })?;

        debug!(path = %config.port, baud = config.baud_rate, "serial port opened");
        Ok(Self {
            port,
            path: config.port.clone(),
            read_timeout: config.read_timeout(),
        })
    }
}

fn io_error(e: serialport::Error) -> Error {
    Error::Io(std::io::Error::from(e))
}

impl ByteTransport for SerialTransport {
    fn bytes_available(&mut self) -> latchkey_core::Result<usize> {
        let available = self.port.bytes_to_read().map_err(io_error)?;
        Ok(available as usize)
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> latchkey_core::Result<()> {
        let deadline = Instant::now() + self.read_timeout;
        let mut filled = 0;

        while filled < buf.len() {
            match self.port.read(&mut buf[filled..]) {
                Ok(0) => {}
                Ok(n) => filled += n,
                Err(e) if e.kind() == ErrorKind::TimedOut || e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(Error::Io(e)),
            }
            if filled < buf.len() && Instant::now() >= deadline {
                trace!(path = %self.path, expected = buf.len(), received = filled, "serial read timed out");
                return Err(Error::timeout(buf.len(), filled));
            }
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> latchkey_core::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()?;
        Ok(())
    }

    fn clear_input(&mut self) -> latchkey_core::Result<()> {
        self.port.clear(ClearBuffer::Input).map_err(io_error)
    }
}
