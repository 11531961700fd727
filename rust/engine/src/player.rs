use serde::{Deserialize, Serialize};

use crate::errors::SessionError;

pub type PlayerId = String;

/// A seated participant. Lives for the whole session; only settlement
/// changes `balance` and `score` once play has started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterPlayer {
    pub id: PlayerId,
    pub name: String,
    /// Position at the table, assigned from roster order.
    #[serde(default)]
    pub seat: usize,
    /// Chip ledger, may go negative.
    #[serde(default)]
    pub balance: i64,
    /// Cumulative penalty points (meld game).
    #[serde(default)]
    pub score: i64,
    #[serde(default)]
    pub eliminated: bool,
}

impl RosterPlayer {
    pub fn new(id: impl Into<PlayerId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            seat: 0,
            balance: 0,
            score: 0,
            eliminated: false,
        }
    }

    pub fn with_balance(mut self, balance: i64) -> Self {
        self.balance = balance;
        self
    }

    /// Players without a name hold a seat but are not dealt in.
    pub fn is_named(&self) -> bool {
        !self.name.trim().is_empty()
    }
}

/// Ordered roster shared by both machines. Seats always mirror the order.
#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    players: Vec<RosterPlayer>,
}

impl Roster {
    pub(crate) fn players(&self) -> &[RosterPlayer] {
        &self.players
    }

    pub(crate) fn get(&self, id: &str) -> Option<&RosterPlayer> {
        self.players.iter().find(|p| p.id == id)
    }

    pub(crate) fn get_mut(&mut self, id: &str) -> Option<&mut RosterPlayer> {
        self.players.iter_mut().find(|p| p.id == id)
    }

    pub(crate) fn name_of(&self, id: &str) -> String {
        self.get(id).map(|p| p.name.clone()).unwrap_or_default()
    }

    pub(crate) fn named(&self) -> impl Iterator<Item = &RosterPlayer> {
        self.players.iter().filter(|p| p.is_named())
    }

    pub(crate) fn replace(&mut self, players: Vec<RosterPlayer>) -> Result<(), SessionError> {
        for (i, p) in players.iter().enumerate() {
            if players[..i].iter().any(|q| q.id == p.id) {
                return Err(SessionError::DuplicatePlayer(p.id.clone()));
            }
        }
        self.players = players;
        self.reseat();
        Ok(())
    }

    pub(crate) fn add(&mut self, player: RosterPlayer) -> Result<(), SessionError> {
        if self.get(&player.id).is_some() {
            return Err(SessionError::DuplicatePlayer(player.id));
        }
        self.players.push(player);
        self.reseat();
        Ok(())
    }

    pub(crate) fn remove(&mut self, id: &str) -> Result<RosterPlayer, SessionError> {
        let idx = self
            .players
            .iter()
            .position(|p| p.id == id)
            .ok_or_else(|| SessionError::PlayerNotFound(id.to_string()))?;
        let removed = self.players.remove(idx);
        self.reseat();
        Ok(removed)
    }

    fn reseat(&mut self) {
        for (seat, p) in self.players.iter_mut().enumerate() {
            p.seat = seat;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seats_follow_roster_order() {
        let mut roster = Roster::default();
        roster
            .replace(vec![
                RosterPlayer::new("a", "Asha"),
                RosterPlayer::new("b", "Bo"),
                RosterPlayer::new("c", "Cy"),
            ])
            .unwrap();
        roster.remove("a").unwrap();
        let seats: Vec<(String, usize)> = roster
            .players()
            .iter()
            .map(|p| (p.id.clone(), p.seat))
            .collect();
        assert_eq!(seats, vec![("b".into(), 0), ("c".into(), 1)]);
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut roster = Roster::default();
        let err = roster
            .replace(vec![RosterPlayer::new("a", "A"), RosterPlayer::new("a", "B")])
            .unwrap_err();
        assert_eq!(err, SessionError::DuplicatePlayer("a".into()));
        roster.add(RosterPlayer::new("a", "A")).unwrap();
        assert!(roster.add(RosterPlayer::new("a", "A2")).is_err());
    }

    #[test]
    fn unnamed_players_are_not_dealt_in() {
        let mut roster = Roster::default();
        roster
            .replace(vec![RosterPlayer::new("a", "A"), RosterPlayer::new("b", "  ")])
            .unwrap();
        assert_eq!(roster.named().count(), 1);
    }
}
