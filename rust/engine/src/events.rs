//! Lifecycle events emitted by the session machines.
//!
//! Machines queue events while applying an operation; the caller drains them
//! afterwards with `drain_events()` and forwards them wherever it likes.

use serde::{Deserialize, Serialize};

use crate::player::{PlayerId, RosterPlayer};
use crate::rummy::{RummyPublicState, RummyRoundSummary};
use crate::teen_patti::{HandSummary, TeenPattiPublicState};

/// Snapshot safe to send to every participant. Never carries a private hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "game", rename_all = "snake_case")]
pub enum PublicState {
    TeenPatti(TeenPattiPublicState),
    Rummy(RummyPublicState),
}

impl PublicState {
    pub fn session_id(&self) -> &str {
        match self {
            PublicState::TeenPatti(s) => &s.session_id,
            PublicState::Rummy(s) => &s.session_id,
        }
    }

    pub fn is_active(&self) -> bool {
        match self {
            PublicState::TeenPatti(s) => s.is_active,
            PublicState::Rummy(s) => s.is_active,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SessionEvent {
    /// After every accepted mutation.
    StateChange { state: PublicState },
    /// A betting hand was settled.
    HandComplete { summary: HandSummary },
    /// A meld round was scored.
    RoundComplete { summary: RummyRoundSummary },
    /// Emitted once, when the session reaches its limit.
    SessionEnded { summary: FinalSummary },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            SessionEvent::StateChange { .. } => "state_change",
            SessionEvent::HandComplete { .. } => "hand_complete",
            SessionEvent::RoundComplete { .. } => "round_complete",
            SessionEvent::SessionEnded { .. } => "session_ended",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionEvent::SessionEnded { .. })
    }
}

/// One roster row in a summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub balance: i64,
    pub score: i64,
    pub eliminated: bool,
}

impl From<&RosterPlayer> for Standing {
    fn from(p: &RosterPlayer) -> Self {
        Self {
            player_id: p.id.clone(),
            name: p.name.clone(),
            seat: p.seat,
            balance: p.balance,
            score: p.score,
            eliminated: p.eliminated,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalSummary {
    pub session_id: String,
    pub session_name: String,
    pub rounds_played: u32,
    pub winner: Option<Standing>,
    /// Best first: highest balance for the betting game, lowest score for the
    /// meld game.
    pub standings: Vec<Standing>,
}
