//! Raspberry Pi GPIO output lines.

use rppal::gpio::Gpio;

use crate::error::{HardwareError, Result};
use crate::traits::{OutputPin, PinLevel};

/// BCM-numbered output line.
#[derive(Debug)]
pub struct RppalOutputPin {
    pin: rppal::gpio::OutputPin,
}

impl RppalOutputPin {
    /// Claim `bcm_pin` as an output already driven to `initial`.
    pub fn new(bcm_pin: u8, initial: PinLevel) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HardwareError::gpio(e.to_string()))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HardwareError::gpio(format!("pin {bcm_pin}: {e}")))?;
        let pin = match initial {
            PinLevel::Low => pin.into_output_low(),
            PinLevel::High => pin.into_output_high(),
        };
        Ok(Self { pin })
    }
}

impl OutputPin for RppalOutputPin {
    fn set_high(&mut self) -> Result<()> {
        self.pin.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<()> {
        self.pin.set_low();
        Ok(())
    }
}
