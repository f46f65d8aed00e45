//! Bing speech recognition (Microsoft cognitive services), keyed by a
//! subscription key exchanged for a short-lived bearer token.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use serde::Deserialize;
use tracing::debug;

use super::{SPEECH_RATE, check_status};
use crate::{Recognizer, SttError, SttResult};

const TOKEN_ENDPOINT: &str = "https://api.cognitive.microsoft.com/sts/v1.0/issueToken";
const RECOGNIZE_ENDPOINT: &str = "https://speech.platform.bing.com/speech/recognition/interactive/cognitiveservices/v1";

/// Tokens are valid for ten minutes; refresh a little earlier.
const TOKEN_LIFETIME: Duration = Duration::from_secs(9 * 60);

pub struct BingRecognizer {
    client: reqwest::Client,
    api_key: Option<String>,
    language: String,
    token: Mutex<Option<(String, Instant)>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RecognizeResponse {
    recognition_status: String,
    #[serde(default)]
    display_text: Option<String>,
}

impl BingRecognizer {
    pub fn new(
        client: reqwest::Client,
        api_key: Option<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            api_key,
            language: language.into(),
            token: Mutex::new(None),
        }
    }

    async fn token(&self, api_key: &str) -> SttResult<String> {
        let cached = self
            .token
            .lock()
            .as_ref()
            .filter(|(_, issued)| issued.elapsed() < TOKEN_LIFETIME)
            .map(|(token, _)| token.clone());
        if let Some(token) = cached {
            return Ok(token);
        }

        debug!("Requesting Bing access token");
        let response = self
            .client
            .post(TOKEN_ENDPOINT)
            .header("Ocp-Apim-Subscription-Key", api_key)
            .header(reqwest::header::CONTENT_LENGTH, "0")
            .send()
            .await?;
        let token = check_status(response).await?.text().await?;

        *self.token.lock() = Some((token.clone(), Instant::now()));
        Ok(token)
    }
}

#[async_trait]
impl Recognizer for BingRecognizer {
    async fn recognize(&self, audio: Bytes) -> SttResult<String> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(SttError::MissingCredentials("bing"))?;

        let pcm = hark_audio::to_pcm16(&audio, SPEECH_RATE)?;
        let wav = hark_audio::encode_wav16(&pcm, SPEECH_RATE)?;
        let token = self.token(api_key).await?;

        debug!(
            language = %self.language,
            audio_bytes = wav.len(),
            "Sending recognition request to Bing"
        );

        let response = self
            .client
            .post(RECOGNIZE_ENDPOINT)
            .query(&[("language", self.language.as_str()), ("format", "simple")])
            .bearer_auth(token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/wav; codec=\"audio/pcm\"; samplerate={}", SPEECH_RATE),
            )
            .body(wav)
            .send()
            .await?;

        let text = check_status(response).await?.text().await?;
        parse_response(&text)
    }

    fn name(&self) -> &str {
        "bing"
    }
}

fn parse_response(body: &str) -> SttResult<String> {
    let parsed: RecognizeResponse =
        serde_json::from_str(body).map_err(|e| SttError::InvalidResponse(e.to_string()))?;

    match parsed.recognition_status.as_str() {
        "Success" => parsed
            .display_text
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .ok_or(SttError::NotUnderstood),
        "NoMatch" | "InitialSilenceTimeout" | "BabbleTimeout" => Err(SttError::NotUnderstood),
        other => Err(SttError::ApiError(format!("recognition status {}", other))),
    }
}
