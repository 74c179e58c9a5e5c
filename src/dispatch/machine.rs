//! Run-level state machine for a dispatch run.
//!
//! [`transition`] is pure: the dispatcher feeds it events and follows the
//! resulting state. Whether a failed send halts the run is decided by
//! [`FAILURE_POLICY`], not by the send loop.

use thiserror::Error;

use super::sender::FailureClass;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Validating,
    /// Waiting on the reply for roster position `index`.
    InFlight { index: usize, total: usize },
    /// The session was refused; remaining recipients were not attempted.
    HaltedAuth,
    Completed,
}

impl RunState {
    pub fn is_running(self) -> bool {
        matches!(self, RunState::Validating | RunState::InFlight { .. })
    }
}

/// How one send call came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    Delivered,
    Rejected(FailureClass),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEvent {
    Start,
    ValidationFailed,
    ValidationPassed { recipients: usize },
    Replied(Reply),
    /// The run stopped on an internal error before finishing.
    Aborted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuation {
    Continue,
    Halt,
}

/// Authorization is a property of the session, so it stops the run; the
/// other failures belong to a single recipient.
pub const FAILURE_POLICY: [(FailureClass, Continuation); 3] = [
    (FailureClass::AuthorizationDenied, Continuation::Halt),
    (FailureClass::AlreadyExists, Continuation::Continue),
    (FailureClass::Other, Continuation::Continue),
];

pub fn continuation(reply: Reply) -> Continuation {
    match reply {
        Reply::Delivered => Continuation::Continue,
        Reply::Rejected(class) => FAILURE_POLICY
            .iter()
            .find(|(c, _)| *c == class)
            .map(|(_, k)| *k)
            .unwrap_or(Continuation::Continue),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid dispatch transition: {event:?} while {state:?}")]
pub struct TransitionError {
    pub state: RunState,
    pub event: RunEvent,
}

pub fn transition(state: RunState, event: RunEvent) -> Result<RunState, TransitionError> {
    let next = match (state, event) {
        (RunState::Idle | RunState::HaltedAuth | RunState::Completed, RunEvent::Start) => {
            RunState::Validating
        }
        (RunState::Validating, RunEvent::ValidationFailed) => RunState::Idle,
        (RunState::Validating, RunEvent::ValidationPassed { recipients: 0 }) => {
            RunState::Completed
        }
        (RunState::Validating, RunEvent::ValidationPassed { recipients }) => RunState::InFlight {
            index: 0,
            total: recipients,
        },
        (RunState::InFlight { index, total }, RunEvent::Replied(reply)) => {
            match continuation(reply) {
                Continuation::Halt => RunState::HaltedAuth,
                Continuation::Continue if index + 1 < total => RunState::InFlight {
                    index: index + 1,
                    total,
                },
                Continuation::Continue => RunState::Completed,
            }
        }
        (RunState::Validating | RunState::InFlight { .. }, RunEvent::Aborted) => RunState::Idle,
        (state, event) => return Err(TransitionError { state, event }),
    };
    Ok(next)
}
