//! Core state machine implementation
//!
//! Drives `on_enter`/`on_exit` of the four states and validates every
//! requested transition against the requesting state's table.

use std::time::Instant;

use tracing::{debug, error, info};

use super::{
    BusyState, ErrorState, IdleState, MachineError, Payload, RecognizingState, State,
    StateBehavior, StateKind, Step, Transition,
};
use crate::context::Context;

/// The state machine that sequences the appliance.
pub struct StateMachine<'a> {
    ctx: &'a Context,
    idle: State<'a>,
    recognizing: State<'a>,
    busy: State<'a>,
    error: State<'a>,
    /// Current state
    current: StateKind,
    /// Time when the current state was entered
    entered_at: Instant,
}

impl<'a> StateMachine<'a> {
    /// Wire the four states against a shared context. Starts in Idle.
    pub fn new(ctx: &'a Context) -> Self {
        Self {
            ctx,
            idle: State::Idle(IdleState::new(ctx)),
            recognizing: State::Recognizing(RecognizingState::new(ctx)),
            busy: State::Busy(BusyState::new(ctx)),
            error: State::Error(ErrorState::new(ctx)),
            current: StateKind::Idle,
            entered_at: Instant::now(),
        }
    }

    /// Get the current state
    pub fn current(&self) -> StateKind {
        self.current
    }

    fn state(&self, kind: StateKind) -> &State<'a> {
        match kind {
            StateKind::Idle => &self.idle,
            StateKind::Recognizing => &self.recognizing,
            StateKind::Busy => &self.busy,
            StateKind::Error => &self.error,
        }
    }

    /// Run the appliance loop from Idle.
    ///
    /// Only returns once a shutdown request cancels a state (`Ok`) or a state
    /// requests a transition its table does not declare (`Err`).
    pub fn start(&mut self) -> Result<(), MachineError> {
        self.current = StateKind::Idle;
        self.entered_at = Instant::now();
        info!("state machine started in Idle state");

        let mut payload = Payload::None;
        loop {
            match self.step(payload)? {
                Some(next) => payload = next,
                None => {
                    info!(state = %self.current, "state machine stopped");
                    return Ok(());
                }
            }
        }
    }

    /// Enter the current state with `payload` and apply the transition it
    /// requests. Returns the payload for the next state, or `None` when the
    /// state was cancelled.
    pub fn step(&mut self, payload: Payload) -> Result<Option<Payload>, MachineError> {
        if self.ctx.cancel().is_cancelled() {
            debug!(state = %self.current, "shutdown requested before entering state");
            return Ok(None);
        }

        debug!(state = %self.current, ?payload, "entering state");
        match self.state(self.current).on_enter(payload) {
            Step::Transition(transition) => self.apply(transition).map(Some),
            Step::Cancelled => {
                info!(state = %self.current, "state cancelled");
                Ok(None)
            }
        }
    }

    /// Resolve `transition` through the current state's table, exit the
    /// current state and make the target current.
    pub fn apply(&mut self, transition: Transition) -> Result<Payload, MachineError> {
        let from = self.current;
        let to = transition.target;
        let state = self.state(from);

        if !from.can_transition_to(to) {
            state.on_exit();
            error!(%from, %to, "undeclared transition");
            return Err(MachineError::UndeclaredTransition { from, to });
        }

        state.on_exit();

        info!(
            %from,
            %to,
            duration_ms = self.entered_at.elapsed().as_millis() as u64,
            "state transition"
        );

        self.current = to;
        self.entered_at = Instant::now();
        Ok(transition.payload)
    }
}
