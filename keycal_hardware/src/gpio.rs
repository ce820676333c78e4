//! Freeze/reset switches on GPIO input pins (Raspberry Pi, via rppal).
//!
//! Switches are wired to ground with the internal pull-up enabled, so a
//! pressed switch reads low.

use keycal_traits::{BoxError, SwitchBank, SwitchState};
use rppal::gpio::{Gpio, InputPin};

use crate::error::HwError;

pub struct GpioSwitches {
    freeze: InputPin,
    reset: InputPin,
}

impl GpioSwitches {
    pub fn new(freeze_pin: u8, reset_pin: u8) -> Result<Self, HwError> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let freeze = gpio
            .get(freeze_pin)
            .map_err(|e| HwError::Gpio(format!("pin {freeze_pin}: {e}")))?
            .into_input_pullup();
        let reset = gpio
            .get(reset_pin)
            .map_err(|e| HwError::Gpio(format!("pin {reset_pin}: {e}")))?
            .into_input_pullup();
        tracing::info!(freeze_pin, reset_pin, "gpio switches ready");
        Ok(Self { freeze, reset })
    }
}

impl SwitchBank for GpioSwitches {
    fn read_switches(&mut self) -> Result<SwitchState, BoxError> {
        Ok(SwitchState {
            freeze: self.freeze.is_low(),
            reset: self.reset.is_low(),
        })
    }
}
