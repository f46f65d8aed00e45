//! IBM Watson text-to-speech.

use async_trait::async_trait;
use hark_core::WatsonTtsConfig;
use serde::Serialize;
use tracing::debug;

use super::{AudioFormat, check_status, play};
use crate::{Speaker, TtsError, TtsResult};

const SYNTHESIZE_ENDPOINT: &str = "https://stream.watsonplatform.net/text-to-speech/api/v1/synthesize";

#[derive(Debug, Clone)]
pub struct WatsonSpeaker {
    client: reqwest::Client,
    config: Option<WatsonTtsConfig>,
}

#[derive(Serialize)]
struct SynthesizeRequest<'a> {
    text: &'a str,
}

impl WatsonSpeaker {
    pub fn new(client: reqwest::Client, config: Option<WatsonTtsConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Speaker for WatsonSpeaker {
    async fn speak(&self, text: &str) -> TtsResult<()> {
        let config = self
            .config
            .as_ref()
            .ok_or(TtsError::MissingCredentials("watson"))?;

        debug!(voice = %config.voice, chars = text.len(), "Requesting Watson speech");

        let response = self
            .client
            .post(SYNTHESIZE_ENDPOINT)
            .query(&[("voice", config.voice.as_str())])
            .basic_auth(&config.username, Some(&config.password))
            .header(reqwest::header::ACCEPT, "audio/wav")
            .json(&SynthesizeRequest { text })
            .send()
            .await?;

        let audio = check_status(response).await?.bytes().await?;
        play(audio.to_vec(), AudioFormat::Wav).await
    }

    fn name(&self) -> &str {
        "watson"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_credentials_fails_before_request() {
        let speaker = WatsonSpeaker::new(reqwest::Client::new(), None);
        let err = speaker.speak("hello").await.unwrap_err();
        assert!(matches!(err, TtsError::MissingCredentials("watson")));
    }
}
