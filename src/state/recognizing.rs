use hark_audio::AudioError;
use hark_speech::Bytes;
use tracing::{error, info, warn};

use super::{ErrorKind, Payload, StateBehavior, StateKind, Step, Transition};
use crate::context::Context;
use crate::renderer::RendererEvent;
use crate::signal::Signal;

/// Records one phrase and turns it into text.
pub struct RecognizingState<'a> {
    ctx: &'a Context,
}

impl<'a> RecognizingState<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }
}

impl StateBehavior for RecognizingState<'_> {
    fn kind(&self) -> StateKind {
        StateKind::Recognizing
    }

    fn on_enter(&self, _payload: Payload) -> Step {
        let ctx = self.ctx;
        let limit = ctx.config().phrase_time_limit();

        ctx.notify(RendererEvent::Listening);
        ctx.signals().assert(Signal::Capturing);
        let captured = ctx.microphone().capture(limit, ctx.cancel());
        ctx.signals().deassert(Signal::Capturing);

        let recording = match captured {
            Ok(recording) => recording,
            Err(AudioError::Cancelled) => {
                ctx.reset_signals();
                return Step::Cancelled;
            }
            Err(e) => {
                error!("audio capture failed: {}", e);
                return Transition::error(None).into();
            }
        };

        ctx.notify(RendererEvent::Recognizing);
        info!(
            bytes = recording.data().len(),
            length_seconds = recording.duration().as_secs_f64(),
            "phrase captured"
        );

        if !recording.heard_speech() {
            info!("no speech detected in recording");
            return Transition::error(Some(ErrorKind::Recognition)).into();
        }

        let recognizer = ctx.recognizer();
        let audio = Bytes::from(recording.into_data());
        match ctx.block_on(recognizer.recognize(audio)) {
            Ok(text) => {
                info!(recognizer = recognizer.name(), text = %text, "speech recognized");
                ctx.notify(RendererEvent::Recognized { text: text.clone() });
                Transition::with_payload(StateKind::Busy, Payload::Utterance(text)).into()
            }
            Err(e) if e.is_not_understood() => {
                info!(recognizer = recognizer.name(), "speech not understood");
                Transition::error(Some(ErrorKind::Recognition)).into()
            }
            Err(e) => {
                warn!(recognizer = recognizer.name(), "recognition failed: {}", e);
                Transition::error(Some(ErrorKind::Connection)).into()
            }
        }
    }

    fn on_exit(&self) {
        self.ctx.reset_signals();
    }
}
