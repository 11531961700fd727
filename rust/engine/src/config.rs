//! Per-session configuration for both game families.

use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// How a session decides it is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum SessionLimit {
    /// Ends once this many rounds have been played.
    Rounds(u32),
    /// Players whose cumulative score exceeds the target are eliminated; the
    /// session ends when at most one player is left.
    Points(u32),
}

/// Settings for the betting game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TeenPattiConfig {
    pub round_limit: u32,
    /// Paid by every dealt-in player before the first action.
    pub boot_amount: u64,
    /// Stake at the start of each hand, in seen-player terms.
    pub initial_stake: u64,
    /// Upper bound for raises; `None` leaves the stake uncapped.
    pub stake_limit: Option<u64>,
    pub request_timeout_secs: u64,
    pub seed: Option<u64>,
}

impl Default for TeenPattiConfig {
    fn default() -> Self {
        Self {
            round_limit: 10,
            boot_amount: 10,
            initial_stake: 10,
            stake_limit: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            seed: None,
        }
    }
}

impl TeenPattiConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.round_limit == 0 {
            return Err(SessionError::InvalidConfig(
                "round_limit must be at least 1".to_string(),
            ));
        }
        if self.initial_stake < 2 {
            return Err(SessionError::InvalidConfig(
                "initial_stake must be at least 2 so a blind bet costs something".to_string(),
            ));
        }
        if let Some(limit) = self.stake_limit {
            if limit < self.initial_stake {
                return Err(SessionError::InvalidConfig(format!(
                    "stake_limit {} is below initial_stake {}",
                    limit, self.initial_stake
                )));
            }
        }
        if self.request_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Settings for the meld game.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RummyConfig {
    pub limit: SessionLimit,
    pub printed_jokers: u8,
    /// Charged for dropping before the first draw of the round.
    pub first_drop_penalty: u32,
    /// Charged for dropping once play is under way.
    pub middle_drop_penalty: u32,
    /// Charged to a player whose declaration is wrong.
    pub wrong_show_penalty: u32,
    /// Cap on the points a single hand can cost.
    pub max_round_points: u32,
    /// Chips per point settled to the round winner; 0 disables chip settlement.
    pub point_value: u32,
    pub request_timeout_secs: u64,
    pub seed: Option<u64>,
}

impl Default for RummyConfig {
    fn default() -> Self {
        Self {
            limit: SessionLimit::Rounds(5),
            printed_jokers: 2,
            first_drop_penalty: 20,
            middle_drop_penalty: 40,
            wrong_show_penalty: 80,
            max_round_points: 80,
            point_value: 0,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            seed: None,
        }
    }
}

impl RummyConfig {
    pub fn validate(&self) -> Result<(), SessionError> {
        match self.limit {
            SessionLimit::Rounds(0) | SessionLimit::Points(0) => {
                return Err(SessionError::InvalidConfig(
                    "session limit must be greater than 0".to_string(),
                ))
            }
            _ => {}
        }
        if self.first_drop_penalty > self.middle_drop_penalty {
            return Err(SessionError::InvalidConfig(
                "first_drop_penalty cannot exceed middle_drop_penalty".to_string(),
            ));
        }
        if self.max_round_points == 0 {
            return Err(SessionError::InvalidConfig(
                "max_round_points must be greater than 0".to_string(),
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(SessionError::InvalidConfig(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}
