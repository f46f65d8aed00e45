use tracing::warn;

use super::{ErrorKind, Payload, StateBehavior, StateKind, Step, Transition};
use crate::context::Context;
use crate::renderer::RendererEvent;

/// User-facing message for a failure category.
pub fn error_message(kind: Option<ErrorKind>) -> &'static str {
    match kind {
        Some(ErrorKind::Connection) => "I'm having trouble connecting",
        Some(ErrorKind::Recognition) => "I didn't catch that",
        None => "Sorry, something went wrong",
    }
}

/// Tells the user what went wrong, then always returns to Idle.
pub struct ErrorState<'a> {
    ctx: &'a Context,
}

impl<'a> ErrorState<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }
}

impl StateBehavior for ErrorState<'_> {
    fn kind(&self) -> StateKind {
        StateKind::Error
    }

    fn on_enter(&self, payload: Payload) -> Step {
        let kind = match payload {
            Payload::Error(kind) => Some(kind),
            _ => None,
        };

        self.ctx.notify(RendererEvent::Error { kind });
        let message = error_message(kind);
        if let Err(e) = self.ctx.say(message) {
            warn!(?kind, "failed to speak error message: {}", e);
        }

        Transition::to(StateKind::Idle).into()
    }

    fn on_exit(&self) {
        self.ctx.reset_signals();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            error_message(Some(ErrorKind::Connection)),
            "I'm having trouble connecting"
        );
        assert_eq!(error_message(Some(ErrorKind::Recognition)), "I didn't catch that");
        assert_eq!(error_message(None), "Sorry, something went wrong");
    }
}
