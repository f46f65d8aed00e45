//! Wake detection.
//!
//! Listeners (keyboard, push button) run on their own threads and push
//! messages into a channel; the Idle state blocks on the receiving end.

use std::io::{self, BufRead};
use std::thread;

use hark_core::WakeSource;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender, error::TryRecvError};
use tracing::{debug, error, info};

/// Outcome of waiting for a wake event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    /// The user asked for attention
    Triggered,
    /// The process is shutting down
    Shutdown,
}

#[derive(Debug, Error)]
pub enum WakeError {
    /// The wake source stopped working
    #[error("wake detector failed: {0}")]
    Failed(String),

    /// The wake source could not be started
    #[error("wake source unavailable: {0}")]
    Unavailable(String),
}

/// A blocking source of wake events.
pub trait WakeDetector: Send + Sync {
    /// Block until the next wake event.
    fn wait(&self) -> Result<Wake, WakeError>;
}

/// Messages sent from listeners to the wake channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WakeMessage {
    Wake,
    Shutdown,
    Failed(String),
}

/// Sending half handed to listeners and the shutdown handler.
#[derive(Debug, Clone)]
pub struct WakeTrigger {
    sender: UnboundedSender<WakeMessage>,
}

impl WakeTrigger {
    pub fn wake(&self) {
        self.send(WakeMessage::Wake);
    }

    pub fn shutdown(&self) {
        self.send(WakeMessage::Shutdown);
    }

    pub fn fail(&self, reason: impl Into<String>) {
        self.send(WakeMessage::Failed(reason.into()));
    }

    fn send(&self, message: WakeMessage) {
        if self.sender.send(message).is_err() {
            debug!("wake channel closed, dropping message");
        }
    }
}

/// Receiving half, used as the appliance's wake detector.
#[derive(Debug)]
pub struct WakeChannel {
    receiver: Mutex<UnboundedReceiver<WakeMessage>>,
}

/// Create a connected trigger/detector pair.
pub fn wake_channel() -> (WakeTrigger, WakeChannel) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        WakeTrigger { sender },
        WakeChannel {
            receiver: Mutex::new(receiver),
        },
    )
}

impl WakeChannel {
    /// Drop wake presses queued while the appliance was busy. A queued
    /// shutdown or failure is returned instead of dropped.
    fn drain_stale(receiver: &mut UnboundedReceiver<WakeMessage>) -> Option<WakeMessage> {
        loop {
            match receiver.try_recv() {
                Ok(WakeMessage::Wake) => debug!("discarding stale wake event"),
                Ok(message) => return Some(message),
                Err(TryRecvError::Empty) => return None,
                Err(TryRecvError::Disconnected) => return Some(WakeMessage::Shutdown),
            }
        }
    }

    fn resolve(message: Option<WakeMessage>) -> Result<Wake, WakeError> {
        match message {
            Some(WakeMessage::Wake) => Ok(Wake::Triggered),
            Some(WakeMessage::Shutdown) | None => Ok(Wake::Shutdown),
            Some(WakeMessage::Failed(reason)) => Err(WakeError::Failed(reason)),
        }
    }
}

impl WakeDetector for WakeChannel {
    fn wait(&self) -> Result<Wake, WakeError> {
        let mut receiver = self.receiver.lock();
        if let Some(message) = Self::drain_stale(&mut receiver) {
            return Self::resolve(Some(message));
        }
        Self::resolve(receiver.blocking_recv())
    }
}

/// Trigger a wake event each time a line is read from stdin.
pub fn spawn_keyboard_listener(trigger: WakeTrigger) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("wake-keyboard".to_string())
        .spawn(move || {
            info!("press Enter to talk");
            for line in io::stdin().lock().lines() {
                match line {
                    Ok(_) => trigger.wake(),
                    Err(e) => {
                        error!("failed to read stdin: {}", e);
                        trigger.fail(e.to_string());
                        return;
                    }
                }
            }
            debug!("stdin closed, keyboard wake listener stopped");
        })
}

/// A running wake listener. Interrupts on the button stop when it is
/// dropped; the keyboard thread ends when stdin closes.
#[derive(Debug)]
pub enum WakeListener {
    Keyboard(thread::JoinHandle<()>),
    #[cfg(feature = "rpi")]
    Button(crate::gpio::WakeButton),
}

/// Start the listener for `source`, feeding `trigger`.
pub fn start_listener(
    source: WakeSource,
    button_pin: u32,
    trigger: WakeTrigger,
) -> Result<WakeListener, WakeError> {
    match source {
        WakeSource::Keyboard => spawn_keyboard_listener(trigger)
            .map(WakeListener::Keyboard)
            .map_err(|e| WakeError::Unavailable(e.to_string())),
        #[cfg(feature = "rpi")]
        WakeSource::Button => crate::gpio::WakeButton::new(button_pin, trigger)
            .map(WakeListener::Button)
            .map_err(|e| WakeError::Unavailable(e.to_string())),
        #[cfg(not(feature = "rpi"))]
        WakeSource::Button => Err(WakeError::Unavailable(format!(
            "wake button on pin {button_pin} needs hark to be built with the `rpi` feature"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_wake_then_shutdown() {
        let (trigger, channel) = wake_channel();
        let waiter = thread::spawn(move || {
            let first = channel.wait().unwrap();
            let second = channel.wait().unwrap();
            (first, second)
        });

        thread::sleep(Duration::from_millis(20));
        trigger.wake();
        thread::sleep(Duration::from_millis(20));
        trigger.shutdown();

        assert_eq!(waiter.join().unwrap(), (Wake::Triggered, Wake::Shutdown));
    }

    #[test]
    fn test_stale_wakes_are_discarded() {
        let (trigger, channel) = wake_channel();
        trigger.wake();
        trigger.wake();
        trigger.shutdown();

        assert_eq!(channel.wait().unwrap(), Wake::Shutdown);
    }

    #[test]
    fn test_closed_channel_is_shutdown() {
        let (trigger, channel) = wake_channel();
        drop(trigger);
        assert_eq!(channel.wait().unwrap(), Wake::Shutdown);
    }

    #[test]
    fn test_failure_is_reported() {
        let (trigger, channel) = wake_channel();
        trigger.fail("gpio gone");
        assert!(matches!(channel.wait(), Err(WakeError::Failed(reason)) if reason == "gpio gone"));
    }

    #[cfg(not(feature = "rpi"))]
    #[test]
    fn test_button_needs_rpi_feature() {
        let (trigger, _channel) = wake_channel();
        let err = start_listener(WakeSource::Button, 24, trigger).unwrap_err();
        assert!(matches!(err, WakeError::Unavailable(reason) if reason.contains("pin 24")));
    }
}
