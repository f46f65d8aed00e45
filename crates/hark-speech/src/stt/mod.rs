//! Speech-to-text backends.

mod bing;
mod google;
mod watson;

pub use bing::BingRecognizer;
pub use google::GoogleRecognizer;
pub use watson::WatsonRecognizer;

use crate::{SttError, SttResult};

/// Sample rate every recognizer is fed with.
const SPEECH_RATE: u32 = 16_000;

/// Turn a non-success HTTP response into an [`SttError::ApiError`].
async fn check_status(response: reqwest::Response) -> SttResult<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    Err(SttError::ApiError(format!("API returned {}: {}", status, body)))
}
