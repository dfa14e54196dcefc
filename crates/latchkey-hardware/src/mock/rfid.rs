//! Mock RFID reader.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::error::Result;
use crate::traits::RfidReader;

#[derive(Debug, Default)]
struct ReaderState {
    cards: VecDeque<String>,
    polls: usize,
}

/// RFID reader returning UIDs presented through its handle.
///
/// # Examples
///
/// ```
/// use latchkey_hardware::mock::MockRfidReader;
/// use latchkey_hardware::traits::RfidReader;
///
/// let (mut reader, handle) = MockRfidReader::new();
/// assert_eq!(reader.poll_uid().unwrap(), None);
///
/// handle.present("04A1B2C3");
/// assert_eq!(reader.poll_uid().unwrap().as_deref(), Some("04A1B2C3"));
/// ```
#[derive(Debug)]
pub struct MockRfidReader {
    state: Arc<Mutex<ReaderState>>,
}

impl MockRfidReader {
    pub fn new() -> (Self, MockRfidReaderHandle) {
        let state = Arc::new(Mutex::new(ReaderState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockRfidReaderHandle { state },
        )
    }
}

impl RfidReader for MockRfidReader {
    fn poll_uid(&mut self) -> Result<Option<String>> {
        let mut state = lock(&self.state);
        state.polls += 1;
        Ok(state.cards.pop_front())
    }
}

/// Handle controlling a [`MockRfidReader`].
#[derive(Debug, Clone)]
pub struct MockRfidReaderHandle {
    state: Arc<Mutex<ReaderState>>,
}

impl MockRfidReaderHandle {
    /// Present a card; the next poll returns its UID.
    pub fn present(&self, uid: impl Into<String>) {
        lock(&self.state).cards.push_back(uid.into());
    }

    pub fn polls(&self) -> usize {
        lock(&self.state).polls
    }
}
