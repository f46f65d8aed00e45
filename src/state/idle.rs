use tracing::{error, info};

use super::{Payload, StateBehavior, StateKind, Step, Transition};
use crate::context::Context;
use crate::renderer::RendererEvent;
use crate::wake::Wake;

/// Waits for the user to ask for attention.
pub struct IdleState<'a> {
    ctx: &'a Context,
}

impl<'a> IdleState<'a> {
    pub fn new(ctx: &'a Context) -> Self {
        Self { ctx }
    }
}

impl StateBehavior for IdleState<'_> {
    fn kind(&self) -> StateKind {
        StateKind::Idle
    }

    fn on_enter(&self, _payload: Payload) -> Step {
        self.ctx.notify(RendererEvent::Idle);

        match self.ctx.wake().wait() {
            Ok(Wake::Triggered) => {
                info!("wake event received");
                Transition::to(StateKind::Recognizing).into()
            }
            Ok(Wake::Shutdown) => Step::Cancelled,
            Err(e) => {
                error!("wake detection failed: {}", e);
                Transition::error(None).into()
            }
        }
    }

    fn on_exit(&self) {
        self.ctx.reset_signals();
    }
}
