//! In-memory collaborators for driving the state machine without hardware or
//! network access.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hark::{
    AudioError, AudioSource, CancelToken, Config, Context, QueryClient, QueryError, Recognizer,
    Recording, Renderer, RendererEvent, Reply, Signal, SignalSink, Speaker, SttError, TtsError,
    Wake, WakeDetector, WakeError,
};
use hark_speech::{Bytes, SttResult, TtsResult};
use parking_lot::Mutex;

pub fn speech() -> Recording {
    Recording::new(vec![0; 44], Duration::from_secs(1), true)
}

pub fn silence() -> Recording {
    Recording::new(vec![0; 44], Duration::from_secs(5), false)
}

pub fn answer(text: &str) -> Reply {
    Reply {
        answer: Some(text.to_string()),
        ..Default::default()
    }
}

/// Wake events handed out in order; shutdown once exhausted.
pub struct ScriptedWake(Mutex<VecDeque<Result<Wake, WakeError>>>);

impl WakeDetector for ScriptedWake {
    fn wait(&self) -> Result<Wake, WakeError> {
        self.0.lock().pop_front().unwrap_or(Ok(Wake::Shutdown))
    }
}

/// Captures handed out in order; a cancelled capture once exhausted.
pub struct FakeMicrophone {
    captures: Mutex<VecDeque<Result<Recording, AudioError>>>,
    signals: RecordingSignals,
    capturing_seen: Arc<Mutex<Vec<bool>>>,
}

impl AudioSource for FakeMicrophone {
    fn capture(&self, _limit: Duration, cancel: &CancelToken) -> hark_audio::Result<Recording> {
        self.capturing_seen
            .lock()
            .push(self.signals.level(Signal::Capturing));
        match self.captures.lock().pop_front() {
            Some(Err(AudioError::Cancelled)) | None => {
                cancel.cancel();
                Err(AudioError::Cancelled)
            }
            Some(result) => result,
        }
    }
}

pub struct FakeRecognizer {
    results: Mutex<VecDeque<SttResult<String>>>,
    calls: Arc<Mutex<usize>>,
}

#[async_trait]
impl Recognizer for FakeRecognizer {
    async fn recognize(&self, _audio: Bytes) -> SttResult<String> {
        *self.calls.lock() += 1;
        self.results
            .lock()
            .pop_front()
            .unwrap_or(Err(SttError::NotUnderstood))
    }

    fn name(&self) -> &str {
        "fake"
    }
}

pub struct FakeQuery {
    replies: Mutex<VecDeque<Result<Reply, QueryError>>>,
    asked: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl QueryClient for FakeQuery {
    async fn ask(&self, text: &str) -> Result<Reply, QueryError> {
        self.asked.lock().push(text.to_string());
        self.replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| Ok(Reply::default()))
    }
}

#[derive(Clone, Default)]
pub struct RecordingSpeaker {
    spoken: Arc<Mutex<Vec<String>>>,
    fail: bool,
}

#[async_trait]
impl Speaker for RecordingSpeaker {
    async fn speak(&self, text: &str) -> TtsResult<()> {
        if self.fail {
            return Err(TtsError::Process("speaker unplugged".to_string()));
        }
        self.spoken.lock().push(text.to_string());
        Ok(())
    }

    fn name(&self) -> &str {
        "recording"
    }
}

#[derive(Clone, Default)]
pub struct RecordingSignals {
    levels: Arc<Mutex<HashMap<Signal, bool>>>,
    history: Arc<Mutex<Vec<(Signal, bool)>>>,
}

impl RecordingSignals {
    pub fn level(&self, signal: Signal) -> bool {
        self.levels.lock().get(&signal).copied().unwrap_or(false)
    }

    pub fn all_low(&self) -> bool {
        Signal::ALL.iter().all(|s| !self.level(*s))
    }

    /// Signals that were ever driven high, in order.
    pub fn asserted(&self) -> Vec<Signal> {
        self.history
            .lock()
            .iter()
            .filter(|(_, high)| *high)
            .map(|(signal, _)| *signal)
            .collect()
    }
}

impl SignalSink for RecordingSignals {
    fn set(&self, signal: Signal, high: bool) -> io::Result<()> {
        self.levels.lock().insert(signal, high);
        self.history.lock().push((signal, high));
        Ok(())
    }
}

#[derive(Clone, Default)]
pub struct RecordingRenderer {
    events: Arc<Mutex<Vec<RendererEvent>>>,
}

impl Renderer for RecordingRenderer {
    fn notify(&self, event: &RendererEvent) {
        self.events.lock().push(event.clone());
    }
}

/// What each collaborator will do, in order.
#[derive(Default)]
pub struct Script {
    pub wakes: Vec<Result<Wake, WakeError>>,
    pub captures: Vec<Result<Recording, AudioError>>,
    pub recognitions: Vec<SttResult<String>>,
    pub replies: Vec<Result<Reply, QueryError>>,
    /// Build the context without a speaker
    pub silent: bool,
    pub speaker_fails: bool,
}

/// Handles for inspecting what the state machine did.
pub struct Probes {
    pub spoken: Arc<Mutex<Vec<String>>>,
    pub asked: Arc<Mutex<Vec<String>>>,
    pub recognitions: Arc<Mutex<usize>>,
    pub capturing_seen: Arc<Mutex<Vec<bool>>>,
    pub signals: RecordingSignals,
    pub events: Arc<Mutex<Vec<RendererEvent>>>,
}

impl Probes {
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }

    pub fn events(&self) -> Vec<RendererEvent> {
        self.events.lock().clone()
    }
}

impl Script {
    /// One full interaction: wake, speech, recognition of `utterance` and
    /// `reply` from the query service.
    pub fn conversation(utterance: &str, reply: Reply) -> Self {
        Self {
            wakes: vec![Ok(Wake::Triggered)],
            captures: vec![Ok(speech())],
            recognitions: vec![Ok(utterance.to_string())],
            replies: vec![Ok(reply)],
            ..Default::default()
        }
    }

    pub fn build(self) -> (Context, Probes) {
        let signals = RecordingSignals::default();
        let renderer = RecordingRenderer::default();
        let speaker = RecordingSpeaker {
            fail: self.speaker_fails,
            ..Default::default()
        };
        let asked = Arc::new(Mutex::new(Vec::new()));
        let recognitions = Arc::new(Mutex::new(0));
        let capturing_seen = Arc::new(Mutex::new(Vec::new()));

        let probes = Probes {
            spoken: speaker.spoken.clone(),
            asked: asked.clone(),
            recognitions: recognitions.clone(),
            capturing_seen: capturing_seen.clone(),
            signals: signals.clone(),
            events: renderer.events.clone(),
        };

        let mut builder = Context::builder(Config::default())
            .wake(Box::new(ScriptedWake(Mutex::new(self.wakes.into()))))
            .microphone(Box::new(FakeMicrophone {
                captures: Mutex::new(self.captures.into()),
                signals: signals.clone(),
                capturing_seen,
            }))
            .recognizer(Box::new(FakeRecognizer {
                results: Mutex::new(self.recognitions.into()),
                calls: recognitions,
            }))
            .query(Box::new(FakeQuery {
                replies: Mutex::new(self.replies.into()),
                asked,
            }))
            .signals(Box::new(signals))
            .renderer(Box::new(renderer));
        if !self.silent {
            builder = builder.speaker(Box::new(speaker));
        }

        let ctx = builder.build().expect("context with every collaborator");
        (ctx, probes)
    }
}
