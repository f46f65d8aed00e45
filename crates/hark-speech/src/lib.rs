//! Speech backends for hark.
//!
//! This crate provides trait-based abstractions for speech-to-text and
//! text-to-speech, with one implementation per supported vendor. Exactly one
//! backend of each kind is selected from the configuration at startup.

mod registry;
mod stt;
mod tts;

use async_trait::async_trait;
pub use bytes::Bytes;
use thiserror::Error;

pub use registry::{
    RegistryError, STT_PROVIDERS, TTS_PROVIDERS, build_recognizer, build_speaker, http_client,
};
pub use stt::{BingRecognizer, GoogleRecognizer, WatsonRecognizer};
pub use tts::{FliteSpeaker, GoogleSpeaker, WatsonSpeaker};

/// Errors that can occur during recognition.
#[derive(Debug, Error)]
pub enum SttError {
    /// The service answered but found no usable utterance
    #[error("speech was not understood")]
    NotUnderstood,

    #[error("No credentials configured for {0}")]
    MissingCredentials(&'static str),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid audio: {0}")]
    InvalidAudio(#[from] hark_audio::AudioError),

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl SttError {
    /// Whether the audio reached the service and simply held no speech.
    ///
    /// Everything else means the request itself failed.
    pub fn is_not_understood(&self) -> bool {
        matches!(self, SttError::NotUnderstood)
    }
}

/// Errors that can occur during synthesis or playback.
#[derive(Debug, Error)]
pub enum TtsError {
    #[error("No credentials configured for {0}")]
    MissingCredentials(&'static str),

    #[error("API request failed: {0}")]
    ApiError(String),

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Playback failed: {0}")]
    Playback(#[from] hark_audio::AudioError),

    #[error("Synthesizer process failed: {0}")]
    Process(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result type for recognition operations.
pub type SttResult<T> = std::result::Result<T, SttError>;

/// Result type for synthesis operations.
pub type TtsResult<T> = std::result::Result<T, TtsError>;

/// Trait for speech-to-text backends.
#[async_trait]
pub trait Recognizer: Send + Sync {
    /// Recognize the speech in a captured WAV recording.
    async fn recognize(&self, audio: Bytes) -> SttResult<String>;

    /// Returns the name of this recognizer for logging/debugging.
    fn name(&self) -> &str;
}

/// Trait for text-to-speech backends. `speak` returns once the text has been
/// played in full.
#[async_trait]
pub trait Speaker: Send + Sync {
    async fn speak(&self, text: &str) -> TtsResult<()>;

    fn name(&self) -> &str;
}
