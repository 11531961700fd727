use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::teen_patti::PlayerStatus;

/// What the player asked for when betting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "amount", rename_all = "snake_case")]
pub enum BetRequest {
    /// Call at the current stake.
    Chaal,
    /// Double the stake, then pay it.
    Double,
    /// Pay an explicit amount, in the player's own terms (a blind player's
    /// amount counts double).
    Amount(u64),
}

impl BetRequest {
    /// Builds a request from the optional `amount` / `double` payload fields.
    pub fn from_payload(amount: Option<u64>, double: bool) -> Result<Self, SessionError> {
        match (amount, double) {
            (Some(a), true) => Err(SessionError::InvalidAmount {
                amount: a,
                reason: "an explicit amount cannot be combined with double".to_string(),
            }),
            (Some(a), false) => Ok(BetRequest::Amount(a)),
            (None, true) => Ok(BetRequest::Double),
            (None, false) => Ok(BetRequest::Chaal),
        }
    }
}

/// Chips actually moved and the stake that applies afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidatedBet {
    pub cost: u64,
    pub new_stake: u64,
}

/// Cost of one stake for a player with `status`: the full stake when seen,
/// half of it (at least 1) when blind.
pub fn stake_cost(status: PlayerStatus, stake: u64) -> u64 {
    match status {
        PlayerStatus::Seen => stake,
        PlayerStatus::Blind => (stake / 2).max(1),
    }
}

/// Validates a bet against the current stake.
///
/// The stake is always kept in seen-player terms. A chaal pays the stake as
/// is, a double pays twice the stake, and an explicit amount must fall between
/// one and two stakes. Anything above `stake_limit` is refused.
///
/// # Examples
///
/// ```
/// use cardtable_engine::rules::{validate_bet, BetRequest, ValidatedBet};
/// use cardtable_engine::teen_patti::PlayerStatus;
///
/// // Blind player doubling a stake of 10 pays 10 and moves the stake to 20.
/// let bet = validate_bet(PlayerStatus::Blind, 10, None, BetRequest::Double).unwrap();
/// assert_eq!(bet, ValidatedBet { cost: 10, new_stake: 20 });
/// ```
pub fn validate_bet(
    status: PlayerStatus,
    stake: u64,
    stake_limit: Option<u64>,
    request: BetRequest,
) -> Result<ValidatedBet, SessionError> {
    let new_stake = match request {
        BetRequest::Chaal => stake,
        BetRequest::Double => stake.saturating_mul(2),
        BetRequest::Amount(amount) => {
            let equivalent = match status {
                PlayerStatus::Seen => amount,
                PlayerStatus::Blind => amount.saturating_mul(2),
            };
            if equivalent < stake {
                return Err(SessionError::InvalidAmount {
                    amount,
                    reason: format!("below the current stake of {}", stake_cost(status, stake)),
                });
            }
            if equivalent > stake.saturating_mul(2) {
                return Err(SessionError::InvalidAmount {
                    amount,
                    reason: format!(
                        "more than double the current stake of {}",
                        stake_cost(status, stake)
                    ),
                });
            }
            if let Some(limit) = stake_limit {
                if equivalent > limit {
                    return Err(SessionError::InvalidAmount {
                        amount,
                        reason: format!("above the stake limit of {}", limit),
                    });
                }
            }
            return Ok(ValidatedBet {
                cost: amount,
                new_stake: equivalent,
            });
        }
    };
    if let Some(limit) = stake_limit {
        if new_stake > limit {
            return Err(SessionError::InvalidAmount {
                amount: stake_cost(status, new_stake),
                reason: format!("above the stake limit of {}", limit),
            });
        }
    }
    Ok(ValidatedBet {
        cost: stake_cost(status, new_stake),
        new_stake,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chaal_costs_half_for_blind() {
        let bet = validate_bet(PlayerStatus::Blind, 20, None, BetRequest::Chaal).unwrap();
        assert_eq!(bet, ValidatedBet { cost: 10, new_stake: 20 });
        let bet = validate_bet(PlayerStatus::Seen, 20, None, BetRequest::Chaal).unwrap();
        assert_eq!(bet, ValidatedBet { cost: 20, new_stake: 20 });
    }

    #[test]
    fn explicit_amount_sets_new_stake() {
        let bet = validate_bet(PlayerStatus::Seen, 10, None, BetRequest::Amount(15)).unwrap();
        assert_eq!(bet, ValidatedBet { cost: 15, new_stake: 15 });
        let bet = validate_bet(PlayerStatus::Blind, 10, None, BetRequest::Amount(8)).unwrap();
        assert_eq!(bet, ValidatedBet { cost: 8, new_stake: 16 });
    }

    #[test]
    fn out_of_range_amounts_are_rejected() {
        assert!(matches!(
            validate_bet(PlayerStatus::Seen, 10, None, BetRequest::Amount(9)),
            Err(SessionError::InvalidAmount { amount: 9, .. })
        ));
        assert!(matches!(
            validate_bet(PlayerStatus::Seen, 10, None, BetRequest::Amount(21)),
            Err(SessionError::InvalidAmount { amount: 21, .. })
        ));
        assert!(matches!(
            validate_bet(PlayerStatus::Blind, 10, None, BetRequest::Amount(11)),
            Err(SessionError::InvalidAmount { .. })
        ));
    }

    #[test]
    fn stake_limit_caps_doubling() {
        assert!(validate_bet(PlayerStatus::Seen, 40, Some(60), BetRequest::Double).is_err());
        let bet = validate_bet(PlayerStatus::Seen, 40, Some(60), BetRequest::Chaal).unwrap();
        assert_eq!(bet.new_stake, 40);
    }

    #[test]
    fn payload_conflict_is_rejected() {
        assert!(BetRequest::from_payload(Some(10), true).is_err());
        assert_eq!(BetRequest::from_payload(None, false).unwrap(), BetRequest::Chaal);
    }
}
