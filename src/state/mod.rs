//! The appliance state machine.
//!
//! Four states, each with a fixed set of reachable targets:
//! - Idle: waits for a wake event
//! - Recognizing: captures one phrase and converts it to text
//! - Busy: asks the query service and speaks the reply
//! - Error: announces what went wrong and returns to Idle

mod busy;
mod error;
mod idle;
mod machine;
mod recognizing;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use busy::{BusyState, FALLBACK_ANSWER, MAX_TABLE_ROWS, spoken_lines};
pub use error::{ErrorState, error_message};
pub use idle::IdleState;
pub use machine::StateMachine;
pub use recognizing::RecognizingState;

/// Identity of a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    Idle,
    Recognizing,
    Busy,
    Error,
}

impl StateKind {
    /// Targets this state may request. Anything else is a wiring bug.
    pub fn transitions(self) -> &'static [StateKind] {
        match self {
            StateKind::Idle => &[StateKind::Recognizing, StateKind::Error],
            StateKind::Recognizing => &[StateKind::Busy, StateKind::Error],
            StateKind::Busy => &[StateKind::Idle, StateKind::Error],
            StateKind::Error => &[StateKind::Idle],
        }
    }

    pub fn can_transition_to(self, target: StateKind) -> bool {
        self.transitions().contains(&target)
    }
}

impl std::fmt::Display for StateKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateKind::Idle => write!(f, "Idle"),
            StateKind::Recognizing => write!(f, "Recognizing"),
            StateKind::Busy => write!(f, "Busy"),
            StateKind::Error => write!(f, "Error"),
        }
    }
}

/// Recoverable failure categories carried into the Error state. A generic
/// failure carries no kind at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// A backend was unreachable, timed out or rejected the request
    Connection,
    /// Audio was captured but held no understandable speech
    Recognition,
}

/// Data handed from one state to the next.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Payload {
    #[default]
    None,
    /// Recognized text, Recognizing -> Busy
    Utterance(String),
    /// Failure category, any -> Error
    Error(ErrorKind),
}

/// A request to move to `target`, produced by `on_enter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub target: StateKind,
    pub payload: Payload,
}

impl Transition {
    pub fn to(target: StateKind) -> Self {
        Self {
            target,
            payload: Payload::None,
        }
    }

    pub fn with_payload(target: StateKind, payload: Payload) -> Self {
        Self { target, payload }
    }

    /// Transition to Error, with a kind or as a generic failure.
    pub fn error(kind: Option<ErrorKind>) -> Self {
        let payload = kind.map_or(Payload::None, Payload::Error);
        Self::with_payload(StateKind::Error, payload)
    }
}

/// Outcome of `on_enter`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Transition(Transition),
    /// A shutdown request interrupted the state; the loop ends here
    Cancelled,
}

impl From<Transition> for Step {
    fn from(transition: Transition) -> Self {
        Step::Transition(transition)
    }
}

/// Programming errors that stop the machine. These are never announced to
/// the user.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MachineError {
    #[error("undeclared transition from {from} to {to}")]
    UndeclaredTransition { from: StateKind, to: StateKind },
}

/// Common capability of every state.
pub trait StateBehavior {
    fn kind(&self) -> StateKind;

    /// Do the state's work and request exactly one transition.
    fn on_enter(&self, payload: Payload) -> Step;

    /// Leave the state. Always de-asserts every signal line.
    fn on_exit(&self);
}

/// The closed set of states.
pub enum State<'a> {
    Idle(IdleState<'a>),
    Recognizing(RecognizingState<'a>),
    Busy(BusyState<'a>),
    Error(ErrorState<'a>),
}

impl StateBehavior for State<'_> {
    fn kind(&self) -> StateKind {
        match self {
            State::Idle(s) => s.kind(),
            State::Recognizing(s) => s.kind(),
            State::Busy(s) => s.kind(),
            State::Error(s) => s.kind(),
        }
    }

    fn on_enter(&self, payload: Payload) -> Step {
        match self {
            State::Idle(s) => s.on_enter(payload),
            State::Recognizing(s) => s.on_enter(payload),
            State::Busy(s) => s.on_enter(payload),
            State::Error(s) => s.on_enter(payload),
        }
    }

    fn on_exit(&self) {
        match self {
            State::Idle(s) => s.on_exit(),
            State::Recognizing(s) => s.on_exit(),
            State::Busy(s) => s.on_exit(),
            State::Error(s) => s.on_exit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_table() {
        assert!(StateKind::Idle.can_transition_to(StateKind::Recognizing));
        assert!(StateKind::Idle.can_transition_to(StateKind::Error));
        assert!(!StateKind::Idle.can_transition_to(StateKind::Busy));

        assert!(StateKind::Recognizing.can_transition_to(StateKind::Busy));
        assert!(!StateKind::Recognizing.can_transition_to(StateKind::Idle));

        assert!(StateKind::Busy.can_transition_to(StateKind::Idle));
        assert!(!StateKind::Busy.can_transition_to(StateKind::Recognizing));

        assert_eq!(StateKind::Error.transitions(), &[StateKind::Idle]);
    }

    #[test]
    fn test_error_transition_payload() {
        assert_eq!(Transition::error(None).payload, Payload::None);
        assert_eq!(
            Transition::error(Some(ErrorKind::Connection)),
            Transition::with_payload(StateKind::Error, Payload::Error(ErrorKind::Connection))
        );
    }

    #[test]
    fn test_error_kind_serialization() {
        let json = serde_json::to_string(&ErrorKind::Recognition).unwrap();
        assert_eq!(json, "\"recognition\"");
    }
}
