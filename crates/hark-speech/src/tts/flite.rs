//! Offline synthesis through the `flite` command line tool.

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::{Speaker, TtsError, TtsResult};

const FLITE_BIN: &str = "flite";

/// Speaks through a local `flite` binary, which plays the audio itself.
#[derive(Debug, Clone)]
pub struct FliteSpeaker {
    program: String,
}

impl Default for FliteSpeaker {
    fn default() -> Self {
        Self::new()
    }
}

impl FliteSpeaker {
    pub fn new() -> Self {
        Self::with_program(FLITE_BIN)
    }

    /// Use a different executable, e.g. an absolute path to flite.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

#[async_trait]
impl Speaker for FliteSpeaker {
    async fn speak(&self, text: &str) -> TtsResult<()> {
        debug!(program = %self.program, chars = text.len(), "Running flite");

        let status = Command::new(&self.program)
            .arg("-t")
            .arg(text)
            .kill_on_drop(true)
            .status()
            .await?;

        if status.success() {
            Ok(())
        } else {
            Err(TtsError::Process(format!("{} exited with {}", self.program, status)))
        }
    }

    fn name(&self) -> &str {
        "flite"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_io_error() {
        let speaker = FliteSpeaker::with_program("/nonexistent/hark-flite");
        let err = speaker.speak("hello").await.unwrap_err();
        assert!(matches!(err, TtsError::Io(_)));
    }
}
