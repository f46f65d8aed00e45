//! IBM Watson speech-to-text.

use async_trait::async_trait;
use bytes::Bytes;
use hark_core::WatsonCredentials;
use serde::Deserialize;
use tracing::debug;

use super::{SPEECH_RATE, check_status};
use crate::{Recognizer, SttError, SttResult};

const RECOGNIZE_ENDPOINT: &str = "https://stream.watsonplatform.net/speech-to-text/api/v1/recognize";

/// Recognizer for the enterprise Watson engine; requires a username and
/// password.
#[derive(Debug, Clone)]
pub struct WatsonRecognizer {
    client: reqwest::Client,
    credentials: Option<WatsonCredentials>,
    language: String,
}

#[derive(Debug, Deserialize)]
struct RecognizeResponse {
    #[serde(default)]
    results: Vec<RecognizeResult>,
}

#[derive(Debug, Deserialize)]
struct RecognizeResult {
    #[serde(default)]
    alternatives: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
}

impl WatsonRecognizer {
    pub fn new(
        client: reqwest::Client,
        credentials: Option<WatsonCredentials>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            client,
            credentials,
            language: language.into(),
        }
    }

    fn model(&self) -> String {
        format!("{}_BroadbandModel", self.language)
    }
}

#[async_trait]
impl Recognizer for WatsonRecognizer {
    async fn recognize(&self, audio: Bytes) -> SttResult<String> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or(SttError::MissingCredentials("watson"))?;

        let pcm = hark_audio::to_pcm16(&audio, SPEECH_RATE)?;
        let wav = hark_audio::encode_wav16(&pcm, SPEECH_RATE)?;

        debug!(
            model = %self.model(),
            audio_bytes = wav.len(),
            "Sending recognition request to Watson"
        );

        let response = self
            .client
            .post(RECOGNIZE_ENDPOINT)
            .query(&[("model", self.model().as_str()), ("profanity_filter", "false")])
            .basic_auth(&credentials.username, Some(&credentials.password))
            .header(reqwest::header::CONTENT_TYPE, "audio/wav")
            .body(wav)
            .send()
            .await?;

        let text = check_status(response).await?.text().await?;
        parse_response(&text)
    }

    fn name(&self) -> &str {
        "watson"
    }
}

fn parse_response(body: &str) -> SttResult<String> {
    let parsed: RecognizeResponse =
        serde_json::from_str(body).map_err(|e| SttError::InvalidResponse(e.to_string()))?;

    let transcript = parsed
        .results
        .iter()
        .filter_map(|r| r.alternatives.first())
        .map(|a| a.transcript.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

    if transcript.is_empty() {
        Err(SttError::NotUnderstood)
    } else {
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_final_results() {
        let body = r#"{"results":[
            {"alternatives":[{"transcript":"what is ","confidence":0.8}],"final":true},
            {"alternatives":[{"transcript":"the time "}],"final":true}
        ],"result_index":0}"#;
        assert_eq!(parse_response(body).unwrap(), "what is the time");
    }

    #[test]
    fn test_parse_empty_results_is_not_understood() {
        let err = parse_response(r#"{"results":[],"result_index":0}"#).unwrap_err();
        assert!(err.is_not_understood());
    }

    #[test]
    fn test_model_follows_language() {
        let recognizer = WatsonRecognizer::new(reqwest::Client::new(), None, "en-GB");
        assert_eq!(recognizer.model(), "en-GB_BroadbandModel");
    }
}
