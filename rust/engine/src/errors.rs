use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::player::PlayerId;
use crate::timers::RequestKind;

/// Every way an operation on a session can be refused. A refused operation
/// never changes the session.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionError {
    #[error("action not allowed while the session is in phase {phase}")]
    WrongPhase { phase: String },
    #[error("it is not {actual}'s turn (waiting on {expected})")]
    NotYourTurn { expected: PlayerId, actual: PlayerId },
    #[error("session is complete")]
    SessionComplete,
    #[error("need at least {required} named players, have {available}")]
    NotEnoughPlayers { required: usize, available: usize },
    #[error("too many players: {count} (maximum {max})")]
    TooManyPlayers { count: usize, max: usize },
    #[error("the roster can only change before the first round")]
    RosterLocked,
    #[error("player {0} not found")]
    PlayerNotFound(PlayerId),
    #[error("player {0} is already seated")]
    DuplicatePlayer(PlayerId),
    #[error("invalid target: {0}")]
    InvalidTarget(String),
    #[error("a {0} request is already pending")]
    RequestPending(RequestKind),
    #[error("no pending {0} request")]
    NoPendingRequest(RequestKind),
    #[error("card {0} is not in hand")]
    CardNotInHand(String),
    #[error("the {0} is empty")]
    EmptyPile(String),
    #[error("draw and discard piles are both exhausted")]
    PilesExhausted,
    #[error("invalid amount {amount}: {reason}")]
    InvalidAmount { amount: u64, reason: String },
    #[error("illegal action: {0}")]
    IllegalAction(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    pub(crate) fn wrong_phase(phase: impl std::fmt::Debug) -> Self {
        SessionError::WrongPhase {
            phase: format!("{:?}", phase),
        }
    }

    pub(crate) fn illegal(msg: impl Into<String>) -> Self {
        SessionError::IllegalAction(msg.into())
    }
}

/// Serializable `{success, error}` projection of an operation result, ready
/// to relay to the client that issued the action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
        }
    }
}

impl<T> From<Result<T, SessionError>> for ActionOutcome {
    fn from(result: Result<T, SessionError>) -> Self {
        match result {
            Ok(_) => ActionOutcome::ok(),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_without_error_on_success() {
        let json = serde_json::to_string(&ActionOutcome::from(Ok::<(), SessionError>(()))).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }

    #[test]
    fn outcome_carries_error_message() {
        let outcome = ActionOutcome::from(Err::<(), _>(SessionError::NotYourTurn {
            expected: "p1".into(),
            actual: "p2".into(),
        }));
        assert!(!outcome.success);
        assert_eq!(
            outcome.error.as_deref(),
            Some("it is not p2's turn (waiting on p1)")
        );
    }
}
