//! Mock credential source.

use std::sync::{Arc, Mutex};

use latchkey_core::{CredentialEvent, CredentialKind};

use super::lock;
use crate::error::{HardwareError, Result};
use crate::traits::CredentialSource;

#[derive(Debug, Default)]
struct SourceState {
    armed: bool,
    ready: Option<Vec<u8>>,
    arm_count: usize,
    disarm_count: usize,
    fail_take: Option<HardwareError>,
}

/// Credential source whose readiness is controlled by its handle.
#[derive(Debug)]
pub struct MockSource {
    kind: CredentialKind,
    state: Arc<Mutex<SourceState>>,
}

impl MockSource {
    pub fn new(kind: CredentialKind) -> (Self, MockSourceHandle) {
        let state = Arc::new(Mutex::new(SourceState::default()));
        (
            Self {
                kind,
                state: Arc::clone(&state),
            },
            MockSourceHandle { state },
        )
    }
}

impl CredentialSource for MockSource {
    fn kind(&self) -> CredentialKind {
        self.kind
    }

    fn is_armed(&self) -> bool {
        lock(&self.state).armed
    }

    async fn arm(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.armed = true;
        state.arm_count += 1;
        Ok(())
    }

    async fn disarm(&mut self) -> Result<()> {
        let mut state = lock(&self.state);
        state.armed = false;
        state.ready = None;
        state.disarm_count += 1;
        Ok(())
    }

    async fn try_take(&mut self) -> Result<Option<CredentialEvent>> {
        let mut state = lock(&self.state);
        if let Some(error) = state.fail_take.take() {
            if !error.is_recoverable() {
                state.armed = false;
            }
            return Err(error);
        }
        if !state.armed {
            return Ok(None);
        }
        match state.ready.take() {
            Some(payload) => {
                state.armed = false;
                Ok(Some(CredentialEvent::now(self.kind, payload)))
            }
            None => Ok(None),
        }
    }
}

/// Handle controlling a [`MockSource`].
#[derive(Debug, Clone)]
pub struct MockSourceHandle {
    state: Arc<Mutex<SourceState>>,
}

impl MockSourceHandle {
    /// Make a credential ready for the next `try_take`.
    pub fn present(&self, payload: Vec<u8>) {
        lock(&self.state).ready = Some(payload);
    }

    /// Whether a presented credential is still waiting to be taken.
    pub fn has_pending(&self) -> bool {
        lock(&self.state).ready.is_some()
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.state).armed
    }

    pub fn arm_count(&self) -> usize {
        lock(&self.state).arm_count
    }

    pub fn disarm_count(&self) -> usize {
        lock(&self.state).disarm_count
    }

    /// Make the next `try_take` fail with a communication error.
    pub fn fail_next_take(&self, message: impl Into<String>) {
        lock(&self.state).fail_take = Some(HardwareError::communication(message));
    }

    /// Make the next `try_take` fail with a short-read timeout, leaving the
    /// source armed.
    pub fn time_out_next_take(&self) {
        lock(&self.state).fail_take = Some(latchkey_core::Error::timeout(8, 3).into());
    }
}
