//! Text-to-speech backends.

mod flite;
mod google;
mod watson;

pub use flite::FliteSpeaker;
pub use google::GoogleSpeaker;
pub use watson::WatsonSpeaker;

use hark_audio::Playback;

use crate::{TtsError, TtsResult};

#[derive(Debug, Clone, Copy)]
enum AudioFormat {
    Mp3,
    Wav,
}

/// Play synthesized audio on a blocking thread and wait for it to finish.
async fn play(audio: Vec<u8>, format: AudioFormat) -> TtsResult<()> {
    tokio::task::spawn_blocking(move || {
        let playback = Playback::new();
        match format {
            AudioFormat::Mp3 => playback.play_mp3(&audio),
            AudioFormat::Wav => playback.play_wav(&audio),
        }
    })
    .await
    .map_err(|e| TtsError::Process(format!("playback task failed: {}", e)))??;
    Ok(())
}

/// Turn a non-success HTTP response into a [`TtsError::ApiError`].
async fn check_status(response: reqwest::Response) -> TtsResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(TtsError::ApiError(format!("API returned {}: {}", status, body)))
}
