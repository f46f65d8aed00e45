//! Audio input and output for hark.
//!
//! Capture records one bounded phrase from the default input device into an
//! in-memory WAV file. Playback decodes synthesized speech (WAV or MP3) and
//! plays it on the default output device.

mod capture;
mod convert;
mod playback;

use std::time::Duration;

use hark_core::CancelToken;
use thiserror::Error;

pub use capture::{Microphone, Recording, db_fs};
pub use convert::{Decoded, decode_mp3, decode_wav, encode_wav16, resample, to_pcm16};
pub use playback::Playback;

#[derive(Debug, Error)]
pub enum AudioError {
    /// generic anyhow error
    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
    /// No recording device available
    #[error("no input device available")]
    NoInputDevice,
    /// No playback device available
    #[error("no output device available")]
    NoOutputDevice,
    /// Sample format not supported
    #[error("sample format not supported: {0}")]
    SampleFormatNotSupported(String),
    /// Build stream error
    #[error(transparent)]
    BuildStream(#[from] cpal::BuildStreamError),
    /// Audio payload could not be decoded
    #[error("failed to decode audio: {0}")]
    Decode(String),
    /// Sample rate conversion failed
    #[error("failed to resample audio: {0}")]
    Resample(String),
    /// Capture was interrupted by a shutdown request
    #[error("capture cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, AudioError>;

/// A scoped, bounded source of speech audio.
///
/// The device is acquired for the duration of one call and released when it
/// returns, whatever the outcome.
pub trait AudioSource: Send + Sync {
    /// Record a single phrase lasting at most `limit`.
    ///
    /// Returns [`AudioError::Cancelled`] as soon as `cancel` is set.
    fn capture(&self, limit: Duration, cancel: &CancelToken) -> Result<Recording>;
}
