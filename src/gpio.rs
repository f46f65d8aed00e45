//! Raspberry Pi GPIO through `rppal`.
//!
//! Only built with the `rpi` feature. Indicator lines are push-pull outputs;
//! the wake button is an active-low input with the internal pull-up enabled.

use std::io;
use std::time::Duration;

use hark_core::Pins;
use parking_lot::Mutex;
use rppal::gpio::{Gpio, InputPin, OutputPin, Trigger};
use thiserror::Error;
use tracing::{debug, info};

use crate::signal::{Signal, SignalSink};
use crate::wake::WakeTrigger;

const BUTTON_DEBOUNCE: Duration = Duration::from_millis(200);

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("gpio error: {0}")]
    Gpio(#[from] rppal::gpio::Error),

    #[error("pin {0} is not a valid BCM GPIO number")]
    InvalidPin(u32),
}

fn bcm(pin: u32) -> Result<u8, GpioError> {
    u8::try_from(pin).map_err(|_| GpioError::InvalidPin(pin))
}

fn output(gpio: &Gpio, pin: u32) -> Result<Mutex<OutputPin>, GpioError> {
    Ok(Mutex::new(gpio.get(bcm(pin)?)?.into_output_low()))
}

/// Indicator lines on GPIO outputs, all low at start.
#[derive(Debug)]
pub struct GpioSignals {
    capturing: Mutex<OutputPin>,
    processing: Mutex<OutputPin>,
    speaking: Mutex<OutputPin>,
}

impl GpioSignals {
    pub fn new(pins: Pins) -> Result<Self, GpioError> {
        let gpio = Gpio::new()?;
        let signals = Self {
            capturing: output(&gpio, pins.capturing)?,
            processing: output(&gpio, pins.processing)?,
            speaking: output(&gpio, pins.speaking)?,
        };
        info!(?pins, "signal pins configured");
        Ok(signals)
    }

    fn line(&self, signal: Signal) -> &Mutex<OutputPin> {
        match signal {
            Signal::Capturing => &self.capturing,
            Signal::Processing => &self.processing,
            Signal::Speaking => &self.speaking,
        }
    }
}

impl SignalSink for GpioSignals {
    fn set(&self, signal: Signal, high: bool) -> io::Result<()> {
        let mut line = self.line(signal).lock();
        if high {
            line.set_high();
        } else {
            line.set_low();
        }
        debug!(signal = signal.name(), pin = line.pin(), high, "signal");
        Ok(())
    }
}

/// Push button on a GPIO input, active low.
///
/// Each debounced falling edge is a wake event. Interrupts stop when the
/// button is dropped.
#[derive(Debug)]
pub struct WakeButton {
    pin: InputPin,
}

impl WakeButton {
    pub fn new(pin: u32, trigger: WakeTrigger) -> Result<Self, GpioError> {
        let mut input = Gpio::new()?.get(bcm(pin)?)?.into_input_pullup();
        input.set_async_interrupt(Trigger::FallingEdge, Some(BUTTON_DEBOUNCE), move |_event| {
            debug!(pin, "wake button pressed");
            trigger.wake();
        })?;
        info!(pin, "press the button to talk");
        Ok(Self { pin: input })
    }

    pub fn pin(&self) -> u8 {
        self.pin.pin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pin_numbers_must_fit_bcm_range() {
        assert_eq!(bcm(27).unwrap(), 27);
        assert!(matches!(bcm(300), Err(GpioError::InvalidPin(300))));
    }
}
