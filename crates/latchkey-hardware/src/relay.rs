//! Door relay.

use std::fmt;
use std::time::Duration;

use tracing::{error, info};

use crate::error::Result;
use crate::traits::{DoorActuator, OutputPin};

/// Lock relay driven by a single output line: high unlocks, low locks.
pub struct RelayActuator {
    pin: Box<dyn OutputPin>,
}

impl fmt::Debug for RelayActuator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayActuator").finish_non_exhaustive()
    }
}

impl RelayActuator {
    /// Take ownership of `pin` and drive it low.
    ///
    /// # Errors
    ///
    /// Fails if the line cannot be driven low; the door state would be unknown.
    pub fn new(mut pin: Box<dyn OutputPin>) -> Result<Self> {
        pin.set_low()?;
        Ok(Self { pin })
    }

    /// Drive the line low.
    pub fn lock(&mut self) -> Result<()> {
        self.pin.set_low()
    }
}

impl DoorActuator for RelayActuator {
    async fn unlock_for(&mut self, duration: Duration) -> Result<()> {
        info!(duration_ms = duration.as_millis() as u64, "door unlocked");
        let raised = self.pin.set_high();
        if raised.is_ok() {
            tokio::time::sleep(duration).await;
        }

        let lowered = self.pin.set_low();
        if let Err(e) = &lowered {
            error!(error = %e, "failed to re-lock door");
        } else {
            info!("door locked");
        }
        raised.and(lowered)
    }
}
