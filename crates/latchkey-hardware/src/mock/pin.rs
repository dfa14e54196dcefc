//! Mock output pin.

use std::sync::{Arc, Mutex};

use super::lock;
use crate::error::{HardwareError, Result};
pub use crate::traits::PinLevel;
use crate::traits::OutputPin;

#[derive(Debug, Default)]
struct PinState {
    levels: Vec<PinLevel>,
    fail_high: bool,
}

/// Output pin recording every level it is driven to.
#[derive(Debug)]
pub struct MockPin {
    name: String,
    state: Arc<Mutex<PinState>>,
}

impl MockPin {
    pub fn new(name: impl Into<String>) -> (Self, MockPinHandle) {
        let state = Arc::new(Mutex::new(PinState::default()));
        (
            Self {
                name: name.into(),
                state: Arc::clone(&state),
            },
            MockPinHandle { state },
        )
    }
}

impl OutputPin for MockPin {
    fn set_high(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.fail_high {
            return Err(HardwareError::gpio(format!("{}: mock failure", self.name)));
        }
        state.levels.push(PinLevel::High);
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        lock(&self.state).levels.push(PinLevel::Low);
        Ok(())
    }
}

/// Handle observing a [`MockPin`].
#[derive(Debug, Clone)]
pub struct MockPinHandle {
    state: Arc<Mutex<PinState>>,
}

impl MockPinHandle {
    /// Levels driven so far, oldest first.
    pub fn levels(&self) -> Vec<PinLevel> {
        lock(&self.state).levels.clone()
    }

    /// Last level driven, if any.
    pub fn current(&self) -> Option<PinLevel> {
        lock(&self.state).levels.last().copied()
    }

    /// Make `set_high` fail.
    pub fn fail_high(&self, fail: bool) {
        lock(&self.state).fail_high = fail;
    }
}
