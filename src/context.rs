//! Shared collaborators of every state.
//!
//! The context is built once at startup and only read afterwards. It owns the
//! tokio runtime used to drive the async backends from the synchronous state
//! machine thread.

use std::future::Future;

use anyhow::{Context as _, anyhow};
use hark_audio::{AudioSource, Microphone};
use hark_core::{CancelToken, Config};
use hark_speech::{Recognizer, Speaker, TtsResult, build_recognizer, build_speaker, http_client};
use tokio::runtime::Runtime;
use tracing::{debug, info, warn};

use crate::query::{QueryClient, SusiClient};
use crate::renderer::{Renderer, RendererEvent};
use crate::signal::{LogSignals, SignalSink, signals_from_config};
use crate::wake::WakeDetector;

pub struct Context {
    config: Config,
    runtime: Runtime,
    cancel: CancelToken,
    wake: Box<dyn WakeDetector>,
    microphone: Box<dyn AudioSource>,
    recognizer: Box<dyn Recognizer>,
    query: Box<dyn QueryClient>,
    speaker: Option<Box<dyn Speaker>>,
    signals: Box<dyn SignalSink>,
    renderer: Option<Box<dyn Renderer>>,
}

impl Context {
    pub fn builder(config: Config) -> ContextBuilder {
        ContextBuilder::new(config)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cancel(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn wake(&self) -> &dyn WakeDetector {
        self.wake.as_ref()
    }

    pub fn microphone(&self) -> &dyn AudioSource {
        self.microphone.as_ref()
    }

    pub fn recognizer(&self) -> &dyn Recognizer {
        self.recognizer.as_ref()
    }

    pub fn query(&self) -> &dyn QueryClient {
        self.query.as_ref()
    }

    /// `None` when the configured text-to-speech provider is unsupported.
    pub fn signals(&self) -> &dyn SignalSink {
        self.signals.as_ref()
    }

    /// Drive a backend future to completion on the context runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Speak `text` with the configured speaker. Silent without one.
    pub fn say(&self, text: &str) -> TtsResult<()> {
        match &self.speaker {
            Some(speaker) => {
                info!(speaker = speaker.name(), text, "speaking");
                self.block_on(speaker.speak(text))
            }
            None => {
                debug!(text, "no speaker configured, staying silent");
                Ok(())
            }
        }
    }

    pub fn notify(&self, event: RendererEvent) {
        if let Some(renderer) = &self.renderer {
            renderer.notify(&event);
        }
    }

    pub fn reset_signals(&self) {
        self.signals.reset_all();
    }
}

/// Assembles a [`Context`]. Wake detector, microphone, recognizer and query
/// client are required; signals default to [`LogSignals`].
pub struct ContextBuilder {
    config: Config,
    runtime: Option<Runtime>,
    cancel: CancelToken,
    wake: Option<Box<dyn WakeDetector>>,
    microphone: Option<Box<dyn AudioSource>>,
    recognizer: Option<Box<dyn Recognizer>>,
    query: Option<Box<dyn QueryClient>>,
    speaker: Option<Box<dyn Speaker>>,
    signals: Option<Box<dyn SignalSink>>,
    renderer: Option<Box<dyn Renderer>>,
}

impl ContextBuilder {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            runtime: None,
            cancel: CancelToken::new(),
            wake: None,
            microphone: None,
            recognizer: None,
            query: None,
            speaker: None,
            signals: None,
            renderer: None,
        }
    }

    /// Resolve every hardware and network backend named by the config.
    ///
    /// Sign-in and location lookup are best effort: failures are logged and
    /// the query client stays anonymous or unlocated. The wake detector is
    /// left for the caller.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let runtime = build_runtime()?;

        let recognizer = build_recognizer(&config).context("failed to build recognizer")?;
        let speaker = build_speaker(&config).context("failed to build speaker")?;

        let client = http_client(config.request_timeout()).context("failed to build HTTP client")?;
        let mut susi = SusiClient::new(client, config.query_endpoint.clone());
        runtime.block_on(async {
            if let Some(login) = config.login() {
                if let Err(e) = susi.sign_in(login).await {
                    warn!("sign in failed, continuing anonymously: {}", e);
                }
            }
            if config.detect_location {
                if let Err(e) = susi.locate().await {
                    warn!("location lookup failed: {}", e);
                }
            }
        });

        let signals = signals_from_config(&config)?;

        let microphone = Microphone::new(config.energy_threshold);

        let mut builder = Self::new(config)
            .runtime(runtime)
            .microphone(Box::new(microphone))
            .recognizer(recognizer)
            .query(Box::new(susi))
            .signals(signals);
        builder.speaker = speaker;
        Ok(builder)
    }

    pub fn runtime(mut self, runtime: Runtime) -> Self {
        self.runtime = Some(runtime);
        self
    }

    pub fn cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn wake(mut self, wake: Box<dyn WakeDetector>) -> Self {
        self.wake = Some(wake);
        self
    }

    pub fn microphone(mut self, microphone: Box<dyn AudioSource>) -> Self {
        self.microphone = Some(microphone);
        self
    }

    pub fn recognizer(mut self, recognizer: Box<dyn Recognizer>) -> Self {
        self.recognizer = Some(recognizer);
        self
    }

    pub fn query(mut self, query: Box<dyn QueryClient>) -> Self {
        self.query = Some(query);
        self
    }

    pub fn speaker(mut self, speaker: Box<dyn Speaker>) -> Self {
        self.speaker = Some(speaker);
        self
    }

    pub fn signals(mut self, signals: Box<dyn SignalSink>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn renderer(mut self, renderer: Box<dyn Renderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    pub fn build(self) -> anyhow::Result<Context> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => build_runtime()?,
        };

        Ok(Context {
            config: self.config,
            runtime,
            cancel: self.cancel,
            wake: self.wake.ok_or_else(|| anyhow!("no wake detector configured"))?,
            microphone: self.microphone.ok_or_else(|| anyhow!("no microphone configured"))?,
            recognizer: self.recognizer.ok_or_else(|| anyhow!("no recognizer configured"))?,
            query: self.query.ok_or_else(|| anyhow!("no query client configured"))?,
            speaker: self.speaker,
            signals: self.signals.unwrap_or_else(|| Box::new(LogSignals)),
            renderer: self.renderer,
        })
    }
}

fn build_runtime() -> anyhow::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()
        .context("failed to build tokio runtime")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_collaborators() {
        let err = Context::builder(Config::default()).build().err().unwrap();
        assert!(err.to_string().contains("wake detector"));
    }
}
