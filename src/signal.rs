//! Hardware indicator lines.
//!
//! The appliance shows its progress on three binary lines. On a Raspberry Pi
//! they are GPIO outputs (see `gpio`, behind the `rpi` feature); elsewhere
//! they are only logged.

use std::io;

use hark_core::{Config, SignalBackend};
use tracing::{debug, warn};

/// Named indicator lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Signal {
    /// Microphone is recording
    Capturing,
    /// Waiting on the query service
    Processing,
    /// Speech is being played
    Speaking,
}

impl Signal {
    pub const ALL: [Signal; 3] = [Signal::Capturing, Signal::Processing, Signal::Speaking];

    pub fn name(self) -> &'static str {
        match self {
            Signal::Capturing => "capturing",
            Signal::Processing => "processing",
            Signal::Speaking => "speaking",
        }
    }
}

/// A set of indicator lines.
///
/// Failures to drive a line are logged and never interrupt the state machine.
pub trait SignalSink: Send + Sync {
    /// Drive one line high or low.
    fn set(&self, signal: Signal, high: bool) -> io::Result<()>;

    fn assert(&self, signal: Signal) {
        if let Err(e) = self.set(signal, true) {
            warn!(signal = signal.name(), "failed to assert signal: {}", e);
        }
    }

    fn deassert(&self, signal: Signal) {
        if let Err(e) = self.set(signal, false) {
            warn!(signal = signal.name(), "failed to de-assert signal: {}", e);
        }
    }

    /// Drive every line low.
    fn reset_all(&self) {
        for signal in Signal::ALL {
            self.deassert(signal);
        }
    }
}

/// Signal sink for machines without indicator hardware.
#[derive(Debug, Default)]
pub struct LogSignals;

impl SignalSink for LogSignals {
    fn set(&self, signal: Signal, high: bool) -> io::Result<()> {
        debug!(signal = signal.name(), high, "signal");
        Ok(())
    }
}

/// Open the signal lines selected by `signals`.
///
/// Asking for GPIO lines on a build or host without them is a startup error
/// rather than a silent fallback.
pub fn signals_from_config(config: &Config) -> anyhow::Result<Box<dyn SignalSink>> {
    match config.signals {
        SignalBackend::Log => Ok(Box::new(LogSignals)),
        #[cfg(feature = "rpi")]
        SignalBackend::Gpio => {
            use anyhow::Context as _;

            let gpio = crate::gpio::GpioSignals::new(config.pins)
                .context("failed to open signal pins")?;
            Ok(Box::new(gpio))
        }
        #[cfg(not(feature = "rpi"))]
        SignalBackend::Gpio => {
            anyhow::bail!("signals = \"gpio\" needs hark to be built with the `rpi` feature")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_signals_never_fail() {
        let signals = LogSignals;
        for signal in Signal::ALL {
            assert!(signals.set(signal, true).is_ok());
        }
        signals.reset_all();
    }

    #[test]
    fn test_log_backend_from_config() {
        let sink = signals_from_config(&Config::default()).unwrap();
        assert!(sink.set(Signal::Speaking, true).is_ok());
    }

    #[cfg(not(feature = "rpi"))]
    #[test]
    fn test_gpio_backend_needs_rpi_feature() {
        let config = Config {
            signals: SignalBackend::Gpio,
            ..Default::default()
        };
        let err = signals_from_config(&config).err().unwrap();
        assert!(err.to_string().contains("rpi"));
    }
}
