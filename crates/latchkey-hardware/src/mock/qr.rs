//! Mock QR scanner.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::lock;
use crate::error::{HardwareError, Result};
use crate::traits::QrScanner;

#[derive(Debug, Default)]
struct ScannerState {
    codes: VecDeque<String>,
    frames: usize,
    fail: bool,
    panic_next: bool,
}

/// QR scanner decoding codes shown through its handle.
#[derive(Debug)]
pub struct MockQrScanner {
    state: Arc<Mutex<ScannerState>>,
}

impl MockQrScanner {
    pub fn new() -> (Self, MockQrScannerHandle) {
        let state = Arc::new(Mutex::new(ScannerState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            MockQrScannerHandle { state },
        )
    }
}

impl QrScanner for MockQrScanner {
    fn scan_frame(&mut self) -> Result<Option<String>> {
        let mut state = lock(&self.state);
        state.frames += 1;
        if state.panic_next {
            state.panic_next = false;
            drop(state);
            panic!("mock camera crashed");
        }
        if state.fail {
            return Err(HardwareError::communication("mock camera frame dropped"));
        }
        Ok(state.codes.pop_front())
    }
}

/// Handle controlling a [`MockQrScanner`].
#[derive(Debug, Clone)]
pub struct MockQrScannerHandle {
    state: Arc<Mutex<ScannerState>>,
}

impl MockQrScannerHandle {
    /// Show a code; the next frame decodes it.
    pub fn show(&self, code: impl Into<String>) {
        lock(&self.state).codes.push_back(code.into());
    }

    /// Frames captured so far.
    pub fn frames(&self) -> usize {
        lock(&self.state).frames
    }

    /// Make frame captures fail.
    pub fn fail_frames(&self, fail: bool) {
        lock(&self.state).fail = fail;
    }

    /// Make the next frame capture panic.
    pub fn panic_next_frame(&self) {
        lock(&self.state).panic_next = true;
    }
}
