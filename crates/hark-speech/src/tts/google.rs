//! Google Translate's speech endpoint.

use async_trait::async_trait;
use tracing::debug;

use super::{AudioFormat, check_status, play};
use crate::{Speaker, TtsResult};

const TTS_ENDPOINT: &str = "https://translate.google.com/translate_tts";

/// The endpoint rejects longer inputs.
const MAX_CHUNK_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct GoogleSpeaker {
    client: reqwest::Client,
    language: String,
}

impl GoogleSpeaker {
    /// `language` is a BCP 47 tag; only its primary subtag is sent.
    pub fn new(client: reqwest::Client, language: impl AsRef<str>) -> Self {
        let language = language
            .as_ref()
            .split(['-', '_'])
            .next()
            .unwrap_or("en")
            .to_string();
        Self { client, language }
    }
}

#[async_trait]
impl Speaker for GoogleSpeaker {
    async fn speak(&self, text: &str) -> TtsResult<()> {
        for chunk in chunk_text(text, MAX_CHUNK_CHARS) {
            debug!(chars = chunk.len(), language = %self.language, "Requesting Google speech");

            let response = self
                .client
                .get(TTS_ENDPOINT)
                .query(&[
                    ("ie", "UTF-8"),
                    ("client", "tw-ob"),
                    ("tl", self.language.as_str()),
                    ("q", chunk.as_str()),
                ])
                .send()
                .await?;

            let audio = check_status(response).await?.bytes().await?;
            play(audio.to_vec(), AudioFormat::Mp3).await?;
        }
        Ok(())
    }

    fn name(&self) -> &str {
        "google"
    }
}

/// Split on whitespace into chunks of at most `max` characters. A single
/// word longer than `max` is cut.
fn chunk_text(text: &str, max: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word = word;
        while word.chars().count() > max {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let split = word
                .char_indices()
                .nth(max)
                .map_or(word.len(), |(i, _)| i);
            chunks.push(word[..split].to_string());
            word = &word[split..];
        }

        let needed =
            current.chars().count() + word.chars().count() + usize::from(!current.is_empty());
        if needed > max && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_primary_subtag() {
        let speaker = GoogleSpeaker::new(reqwest::Client::new(), "en-US");
        assert_eq!(speaker.language, "en");
    }

    #[test]
    fn test_chunk_short_text_is_single() {
        assert_eq!(chunk_text("3 o'clock", 200), vec!["3 o'clock".to_string()]);
    }

    #[test]
    fn test_chunk_respects_limit() {
        let chunks = chunk_text("aaa bbb ccc ddd", 7);
        assert_eq!(chunks, vec!["aaa bbb", "ccc ddd"]);
    }

    #[test]
    fn test_chunk_cuts_long_words() {
        let chunks = chunk_text("abcdefghij xy", 4);
        assert_eq!(chunks, vec!["abcd", "efgh", "ij", "xy"]);
    }

    #[test]
    fn test_chunk_empty_text() {
        assert!(chunk_text("   ", 10).is_empty());
    }
}
