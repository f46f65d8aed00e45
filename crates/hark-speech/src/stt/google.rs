//! Google speech API (the endpoint used by Chromium's speech input).

use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;
use tracing::debug;

use super::{SPEECH_RATE, check_status};
use crate::{Recognizer, SttError, SttResult};

const RECOGNIZE_ENDPOINT: &str = "https://www.google.com/speech-api/v2/recognize";

/// Recognizer for the general-purpose Google cloud engine.
#[derive(Debug, Clone)]
pub struct GoogleRecognizer {
    client: reqwest::Client,
    key: Option<String>,
    language: String,
}

/// The endpoint streams one JSON document per line; the first is usually an
/// empty `{"result":[]}`.
#[derive(Debug, Deserialize)]
struct ResponseLine {
    #[serde(default)]
    result: Vec<ResultEntry>,
}

#[derive(Debug, Deserialize)]
struct ResultEntry {
    #[serde(default)]
    alternative: Vec<Alternative>,
}

#[derive(Debug, Deserialize)]
struct Alternative {
    transcript: String,
    confidence: Option<f64>,
}

impl GoogleRecognizer {
    pub fn new(client: reqwest::Client, key: Option<String>, language: impl Into<String>) -> Self {
        Self {
            client,
            key,
            language: language.into(),
        }
    }
}

#[async_trait]
impl Recognizer for GoogleRecognizer {
    async fn recognize(&self, audio: Bytes) -> SttResult<String> {
        let key = self
            .key
            .as_deref()
            .ok_or(SttError::MissingCredentials("google"))?;

        let pcm = hark_audio::to_pcm16(&audio, SPEECH_RATE)?;
        let body: Vec<u8> = pcm.iter().flat_map(|s| s.to_le_bytes()).collect();

        debug!(
            language = %self.language,
            audio_bytes = body.len(),
            "Sending recognition request to Google"
        );

        let response = self
            .client
            .post(RECOGNIZE_ENDPOINT)
            .query(&[
                ("client", "chromium"),
                ("lang", self.language.as_str()),
                ("key", key),
            ])
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("audio/l16; rate={}", SPEECH_RATE),
            )
            .body(body)
            .send()
            .await?;

        let text = check_status(response).await?.text().await?;
        parse_response(&text)
    }

    fn name(&self) -> &str {
        "google"
    }
}

fn parse_response(body: &str) -> SttResult<String> {
    for line in body.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let parsed: ResponseLine = serde_json::from_str(line)
            .map_err(|e| SttError::InvalidResponse(e.to_string()))?;

        let Some(entry) = parsed.result.into_iter().find(|r| !r.alternative.is_empty()) else {
            continue;
        };

        let best = entry
            .alternative
            .into_iter()
            .max_by(|a, b| {
                a.confidence
                    .unwrap_or(0.0)
                    .total_cmp(&b.confidence.unwrap_or(0.0))
            })
            .map(|a| a.transcript.trim().to_string())
            .unwrap_or_default();

        if !best.is_empty() {
            return Ok(best);
        }
    }

    Err(SttError::NotUnderstood)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_empty_first_line() {
        let body = concat!(
            "{\"result\":[]}\n",
            "{\"result\":[{\"alternative\":[",
            "{\"transcript\":\"what is the time\",\"confidence\":0.91},",
            "{\"transcript\":\"what is the thyme\"}",
            "],\"final\":true}],\"result_index\":0}\n"
        );
        assert_eq!(parse_response(body).unwrap(), "what is the time");
    }

    #[test]
    fn test_parse_picks_most_confident() {
        let body = r#"{"result":[{"alternative":[{"transcript":"a","confidence":0.2},{"transcript":"b","confidence":0.7}]}]}"#;
        assert_eq!(parse_response(body).unwrap(), "b");
    }

    #[test]
    fn test_parse_no_result_is_not_understood() {
        assert!(parse_response("{\"result\":[]}\n").unwrap_err().is_not_understood());
        assert!(parse_response("").unwrap_err().is_not_understood());
    }

    #[test]
    fn test_parse_garbage_is_invalid() {
        assert!(matches!(
            parse_response("<html>"),
            Err(SttError::InvalidResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let recognizer = GoogleRecognizer::new(reqwest::Client::new(), None, "en-US");
        let err = recognizer.recognize(Bytes::new()).await.unwrap_err();
        assert!(matches!(err, SttError::MissingCredentials("google")));
    }
}
