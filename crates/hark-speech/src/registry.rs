//! Startup-time selection of the configured backends.

use std::time::Duration;

use hark_core::Config;
use thiserror::Error;
use tracing::{info, warn};

use crate::{
    BingRecognizer, FliteSpeaker, GoogleRecognizer, GoogleSpeaker, Recognizer, Speaker,
    WatsonRecognizer, WatsonSpeaker,
};

/// Names accepted for `default_stt`.
pub const STT_PROVIDERS: &[&str] = &["google", "watson", "bing"];

/// Names accepted for `default_tts`.
pub const TTS_PROVIDERS: &[&str] = &["google", "flite", "watson"];

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("unknown speech-to-text provider {0:?}, expected google, watson or bing")]
    UnknownStt(String),
    #[error("failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Build an HTTP client whose every request is bounded by `timeout`.
pub fn http_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
}

/// Resolve `default_stt` into its recognizer.
///
/// Credentials are checked lazily; a recognizer with missing credentials
/// fails each request instead.
pub fn build_recognizer(config: &Config) -> Result<Box<dyn Recognizer>, RegistryError> {
    let client = http_client(config.request_timeout())?;
    let language = config.language.clone();

    let recognizer: Box<dyn Recognizer> = match config.default_stt.as_str() {
        "google" => Box::new(GoogleRecognizer::new(
            client,
            config.google_stt_key.clone(),
            language,
        )),
        "watson" => Box::new(WatsonRecognizer::new(
            client,
            config.watson_stt.clone(),
            language,
        )),
        "bing" => Box::new(BingRecognizer::new(
            client,
            config.bing_speech_api_key.clone(),
            language,
        )),
        other => return Err(RegistryError::UnknownStt(other.to_string())),
    };

    info!(provider = recognizer.name(), "speech-to-text backend selected");
    Ok(recognizer)
}

/// Resolve `default_tts` into its speaker.
///
/// An unsupported name yields `None`: the appliance then stays silent rather
/// than falling back to another provider.
pub fn build_speaker(config: &Config) -> reqwest::Result<Option<Box<dyn Speaker>>> {
    let client = http_client(config.request_timeout())?;

    let speaker: Box<dyn Speaker> = match config.default_tts.as_str() {
        "google" => Box::new(GoogleSpeaker::new(client, config.language.clone())),
        "flite" => Box::new(FliteSpeaker::new()),
        "watson" => Box::new(WatsonSpeaker::new(client, config.watson_tts.clone())),
        other => {
            warn!(
                provider = other,
                supported = ?TTS_PROVIDERS,
                "unsupported text-to-speech provider, speech output is disabled"
            );
            return Ok(None);
        }
    };

    info!(provider = speaker.name(), "text-to-speech backend selected");
    Ok(Some(speaker))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(stt: &str, tts: &str) -> Config {
        Config {
            default_stt: stt.to_string(),
            default_tts: tts.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_every_stt_provider_resolves() {
        for provider in STT_PROVIDERS {
            let recognizer = build_recognizer(&config(provider, "google")).unwrap();
            assert_eq!(recognizer.name(), *provider);
        }
    }

    #[test]
    fn test_every_tts_provider_resolves() {
        for provider in TTS_PROVIDERS {
            let speaker = build_speaker(&config("google", provider)).unwrap().unwrap();
            assert_eq!(speaker.name(), *provider);
        }
    }

    #[test]
    fn test_unknown_stt_is_an_error() {
        let err = build_recognizer(&config("sphinx", "google")).err().unwrap();
        assert!(matches!(err, RegistryError::UnknownStt(name) if name == "sphinx"));
    }

    #[test]
    fn test_unknown_tts_disables_speech() {
        assert!(build_speaker(&config("google", "espeak")).unwrap().is_none());
    }
}
