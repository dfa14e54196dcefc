//! Mock byte transport.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use latchkey_core::{Error, Result};

use super::lock;
use crate::traits::ByteTransport;

#[derive(Debug, Default)]
struct TransportState {
    inbound: VecDeque<u8>,
    replies: VecDeque<Vec<u8>>,
    writes: Vec<Vec<u8>>,
    fail_writes: bool,
}

/// In-memory stand-in for the sensor's serial line.
///
/// Reads never wait: a read that cannot be satisfied consumes what is there
/// and fails with [`Error::Timeout`], as a serial port would after its
/// bounded wait.
///
/// # Examples
///
/// ```
/// use latchkey_hardware::mock::MockTransport;
/// use latchkey_hardware::traits::ByteTransport;
///
/// let (mut transport, handle) = MockTransport::new();
/// handle.feed(&[1, 2, 3]);
///
/// let mut buf = [0u8; 2];
/// transport.read_exact(&mut buf).unwrap();
/// assert_eq!(buf, [1, 2]);
/// assert_eq!(transport.bytes_available().unwrap(), 1);
/// ```
#[derive(Debug)]
pub struct MockTransport {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransport {
    pub fn new() -> (Self, MockTransportHandle) {
        let state = Arc::new(Mutex::new(TransportState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockTransportHandle { state },
        )
    }
}

impl ByteTransport for MockTransport {
    fn bytes_available(&mut self) -> Result<usize> {
        Ok(lock(&self.state).inbound.len())
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<()> {
        let mut state = lock(&self.state);
        let wanted = buf.len();
        let available = state.inbound.len();
        if available < wanted {
            state.inbound.clear();
            return Err(Error::timeout(wanted, available));
        }
        for (slot, byte) in buf.iter_mut().zip(state.inbound.drain(..wanted)) {
            *slot = byte;
        }
        Ok(())
    }

    fn write_all(&mut self, bytes: &[u8]) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_writes {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "mock transport write failure",
            )));
        }
        state.writes.push(bytes.to_vec());
        if let Some(reply) = state.replies.pop_front() {
            state.inbound.extend(reply);
        }
        Ok(())
    }

    fn clear_input(&mut self) -> Result<()> {
        lock(&self.state).inbound.clear();
        Ok(())
    }
}

/// Handle controlling a [`MockTransport`].
#[derive(Debug, Clone)]
pub struct MockTransportHandle {
    state: Arc<Mutex<TransportState>>,
}

impl MockTransportHandle {
    /// Make bytes readable immediately.
    pub fn feed(&self, bytes: &[u8]) {
        lock(&self.state).inbound.extend(bytes.iter().copied());
    }

    /// Queue bytes that become readable when the next write happens.
    pub fn reply_on_write(&self, bytes: &[u8]) {
        lock(&self.state).replies.push_back(bytes.to_vec());
    }

    /// Every write performed so far, one entry per call.
    pub fn writes(&self) -> Vec<Vec<u8>> {
        lock(&self.state).writes.clone()
    }

    /// Bytes fed but not yet read.
    pub fn pending_input(&self) -> usize {
        lock(&self.state).inbound.len()
    }

    /// Make subsequent writes fail.
    pub fn fail_writes(&self, fail: bool) {
        lock(&self.state).fail_writes = fail;
    }
}
