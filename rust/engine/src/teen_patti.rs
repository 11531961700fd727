//! Betting-game session machine.
//!
//! Phases run `Setup -> Active -> Showdown -> Active ... -> Ended`. Every
//! operation either applies completely or is refused with the state left
//! untouched. Side shows and shows are adjudicated from outside: the machine
//! opens a pending request and waits for a resolve action naming the winner.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cards::{full_deck, Card};
use crate::config::TeenPattiConfig;
use crate::deck::{session_rng, Deck, SessionRng};
use crate::errors::SessionError;
use crate::events::{FinalSummary, PublicState, SessionEvent, Standing};
use crate::hand::{evaluate_hand, HandStrength};
use crate::logger::{LogEntry, SessionLog, PUBLIC_LOG_TAIL};
use crate::player::{PlayerId, Roster, RosterPlayer};
use crate::rules::{stake_cost, validate_bet, BetRequest};
use crate::timers::{PendingRequest, RequestBook, RequestKind, TimerCommand};
use crate::turns::{active_count, next_active};

pub const TEEN_PATTI_HAND_SIZE: usize = 3;
pub const MIN_PLAYERS: usize = 2;
/// Three cards each from a single 52-card deck.
pub const MAX_PLAYERS: usize = 17;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeenPattiPhase {
    Setup,
    Active,
    Showdown,
    Ended,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PlayerStatus {
    Blind,
    Seen,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TeenPattiAction {
    Seen {
        player_id: PlayerId,
    },
    Fold {
        player_id: PlayerId,
    },
    Bet {
        player_id: PlayerId,
        #[serde(default)]
        amount: Option<u64>,
        #[serde(default)]
        double: bool,
    },
    SideShowRequest {
        player_id: PlayerId,
        target_id: PlayerId,
    },
    SideShowResolve {
        winner_id: PlayerId,
    },
    Show {
        player_id: PlayerId,
    },
    ForceShow {
        player_id: PlayerId,
        target_id: PlayerId,
    },
    ShowResolve {
        winner_id: PlayerId,
    },
    CancelRequest {
        player_id: PlayerId,
        kind: RequestKind,
    },
    /// Fed back by the host when a request timer fires.
    ExpireRequest {
        kind: RequestKind,
        request_id: u64,
    },
}

impl TeenPattiAction {
    pub fn name(&self) -> &'static str {
        match self {
            TeenPattiAction::Seen { .. } => "SEEN",
            TeenPattiAction::Fold { .. } => "FOLD",
            TeenPattiAction::Bet { .. } => "BET",
            TeenPattiAction::SideShowRequest { .. } => "SIDE_SHOW_REQUEST",
            TeenPattiAction::SideShowResolve { .. } => "SIDE_SHOW_RESOLVE",
            TeenPattiAction::Show { .. } => "SHOW",
            TeenPattiAction::ForceShow { .. } => "FORCE_SHOW",
            TeenPattiAction::ShowResolve { .. } => "SHOW_RESOLVE",
            TeenPattiAction::CancelRequest { .. } => "CANCEL_REQUEST",
            TeenPattiAction::ExpireRequest { .. } => "EXPIRE_REQUEST",
        }
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandEndReason {
    LastPlayerStanding,
    SideShow,
    Show,
    ForceShow,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerDelta {
    pub player_id: PlayerId,
    pub name: String,
    pub invested: u64,
    pub net: i64,
    /// Roster balance after settlement.
    pub balance: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HandSummary {
    pub session_id: String,
    pub round: u32,
    pub winner_id: PlayerId,
    pub winner_name: String,
    pub pot: u64,
    pub reason: HandEndReason,
    pub deltas: Vec<PlayerDelta>,
    pub is_session_over: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeenPattiPlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub balance: i64,
    pub in_round: bool,
    pub status: Option<PlayerStatus>,
    pub folded: bool,
    pub invested: u64,
    pub card_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeenPattiPublicState {
    pub session_id: String,
    pub session_name: String,
    pub phase: TeenPattiPhase,
    pub is_active: bool,
    pub round: u32,
    pub round_limit: u32,
    pub boot_amount: u64,
    pub pot: u64,
    pub stake: u64,
    pub stake_limit: Option<u64>,
    pub current_player: Option<PlayerId>,
    pub players: Vec<TeenPattiPlayerView>,
    pub pending_requests: Vec<PendingRequest>,
    pub log: Vec<LogEntry>,
}

/// A player's own cards. Empty until the player has looked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeenPattiHandView {
    pub player_id: PlayerId,
    pub status: PlayerStatus,
    pub folded: bool,
    pub cards: Vec<Card>,
    pub strength: Option<HandStrength>,
}

#[derive(Debug, Clone)]
struct RoundPlayer {
    player_id: PlayerId,
    hand: Vec<Card>,
    status: PlayerStatus,
    folded: bool,
    invested: u64,
}

/// Per-round play state, replaced wholesale by every `start_round`.
#[derive(Debug, Clone)]
struct TeenPattiRound {
    players: Vec<RoundPlayer>,
    pot: u64,
    stake: u64,
    current: usize,
}

impl TeenPattiRound {
    fn index_of(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.player_id == player_id)
    }

    fn unfolded(&self) -> usize {
        active_count(self.players.len(), |i| !self.players[i].folded)
    }

    fn sole_survivor(&self) -> Option<usize> {
        if self.unfolded() == 1 {
            self.players.iter().position(|p| !p.folded)
        } else {
            None
        }
    }

    fn advance_from(&mut self, from: usize) {
        let players = &self.players;
        if let Some(next) = next_active(players.len(), from, |i| !players[i].folded) {
            self.current = next;
        }
    }

    fn require_turn(&self, player_id: &str) -> Result<usize, SessionError> {
        let idx = self
            .index_of(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_string()))?;
        if idx != self.current {
            return Err(SessionError::NotYourTurn {
                expected: self.players[self.current].player_id.clone(),
                actual: player_id.to_string(),
            });
        }
        Ok(idx)
    }

    fn charge(&mut self, idx: usize, amount: u64) {
        self.players[idx].invested += amount;
        self.pot += amount;
    }
}

/// One betting-game session.
///
/// ```
/// use cardtable_engine::config::TeenPattiConfig;
/// use cardtable_engine::player::RosterPlayer;
/// use cardtable_engine::teen_patti::{TeenPattiAction, TeenPattiSession};
///
/// let mut s = TeenPattiSession::new("s1", "friday", TeenPattiConfig::default()).unwrap();
/// s.set_players(vec![RosterPlayer::new("a", "Asha"), RosterPlayer::new("b", "Bo")]).unwrap();
/// s.start_round().unwrap();
/// s.handle_action(TeenPattiAction::Fold { player_id: "a".into() }).unwrap();
/// assert_eq!(s.roster()[1].balance, 10);
/// ```
#[derive(Debug)]
pub struct TeenPattiSession {
    id: String,
    name: String,
    config: TeenPattiConfig,
    phase: TeenPattiPhase,
    active: bool,
    round_counter: u32,
    roster: Roster,
    round: Option<TeenPattiRound>,
    requests: RequestBook,
    log: SessionLog,
    events: Vec<SessionEvent>,
    rng: SessionRng,
}

impl TeenPattiSession {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: TeenPattiConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            phase: TeenPattiPhase::Setup,
            active: true,
            round_counter: 1,
            roster: Roster::default(),
            round: None,
            requests: RequestBook::new(Duration::from_secs(config.request_timeout_secs)),
            log: SessionLog::new(),
            events: Vec::new(),
            rng: session_rng(config.seed),
            config,
        })
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TeenPattiConfig {
        &self.config
    }

    pub fn phase(&self) -> TeenPattiPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Number of the round being played, or the next one between rounds.
    pub fn round_number(&self) -> u32 {
        self.round_counter
    }

    pub fn is_session_over(&self) -> bool {
        !self.active
    }

    pub fn roster(&self) -> &[RosterPlayer] {
        self.roster.players()
    }

    pub fn log(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn pot(&self) -> u64 {
        self.round.as_ref().map_or(0, |r| r.pot)
    }

    pub fn stake(&self) -> u64 {
        self.round
            .as_ref()
            .map_or(self.config.initial_stake, |r| r.stake)
    }

    pub fn current_player(&self) -> Option<&str> {
        if self.phase != TeenPattiPhase::Active {
            return None;
        }
        let round = self.round.as_ref()?;
        Some(round.players[round.current].player_id.as_str())
    }

    pub fn pending_request(&self, kind: RequestKind) -> Option<&PendingRequest> {
        self.requests.get(kind)
    }

    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn drain_timer_commands(&mut self) -> Vec<TimerCommand> {
        self.requests.drain_commands()
    }

    pub fn set_players(&mut self, players: Vec<RosterPlayer>) -> Result<(), SessionError> {
        self.ensure_setup()?;
        self.roster.replace(players)?;
        self.log.push(
            self.round_counter,
            format!("Roster set with {} players", self.roster.players().len()),
        );
        self.emit_state();
        Ok(())
    }

    pub fn add_player(&mut self, player: RosterPlayer) -> Result<(), SessionError> {
        self.ensure_setup()?;
        let name = player.name.clone();
        self.roster.add(player)?;
        self.log.push(self.round_counter, format!("{} joined", name));
        self.emit_state();
        Ok(())
    }

    pub fn remove_player(&mut self, player_id: &str) -> Result<(), SessionError> {
        self.ensure_setup()?;
        let removed = self.roster.remove(player_id)?;
        self.log
            .push(self.round_counter, format!("{} left", removed.name));
        self.emit_state();
        Ok(())
    }

    /// Shuffles a fresh deck and deals the next round.
    pub fn start_round(&mut self) -> Result<(), SessionError> {
        let ids = self.check_can_start()?;
        let deck = Deck::shuffled(full_deck(), &mut self.rng);
        self.deal(ids, deck)
    }

    /// Deals the next round from `cards` in the given order.
    pub fn start_round_with_deck(&mut self, cards: Vec<Card>) -> Result<(), SessionError> {
        let ids = self.check_can_start()?;
        if cards.len() < ids.len() * TEEN_PATTI_HAND_SIZE {
            return Err(SessionError::illegal(format!(
                "prepared deck holds {} cards, {} players need {}",
                cards.len(),
                ids.len(),
                ids.len() * TEEN_PATTI_HAND_SIZE
            )));
        }
        let mut seen = HashSet::with_capacity(cards.len());
        if let Some(dup) = cards.iter().find(|c| !seen.insert(**c)) {
            return Err(SessionError::illegal(format!(
                "prepared deck repeats {}",
                dup
            )));
        }
        self.deal(ids, Deck::new(cards))
    }

    /// Single entry point for gameplay actions.
    pub fn handle_action(&mut self, action: TeenPattiAction) -> Result<(), SessionError> {
        let name = action.name();
        match self.apply(action) {
            Ok(true) => {
                debug!(session_id = %self.id, action = name, round = self.round_counter, "action applied");
                self.emit_state();
                Ok(())
            }
            Ok(false) => Ok(()),
            Err(e) => {
                warn!(session_id = %self.id, action = name, error = %e, "action rejected");
                Err(e)
            }
        }
    }

    pub fn public_state(&self) -> TeenPattiPublicState {
        let round = self.round.as_ref();
        let players = self
            .roster
            .players()
            .iter()
            .map(|rp| {
                let p = round.and_then(|r| r.players.iter().find(|p| p.player_id == rp.id));
                TeenPattiPlayerView {
                    player_id: rp.id.clone(),
                    name: rp.name.clone(),
                    seat: rp.seat,
                    balance: rp.balance,
                    in_round: p.is_some(),
                    status: p.map(|p| p.status),
                    folded: p.is_some_and(|p| p.folded),
                    invested: p.map_or(0, |p| p.invested),
                    card_count: p.map_or(0, |p| p.hand.len()),
                }
            })
            .collect();
        TeenPattiPublicState {
            session_id: self.id.clone(),
            session_name: self.name.clone(),
            phase: self.phase,
            is_active: self.active,
            round: self.round_counter,
            round_limit: self.config.round_limit,
            boot_amount: self.config.boot_amount,
            pot: self.pot(),
            stake: self.stake(),
            stake_limit: self.config.stake_limit,
            current_player: self.current_player().map(str::to_string),
            players,
            pending_requests: self.requests.pending(),
            log: self.log.tail(PUBLIC_LOG_TAIL),
        }
    }

    /// The owner's view of their hand. Cards stay hidden while the player is
    /// blind and the hand is still being played.
    pub fn player_hand(&self, player_id: &str) -> Result<TeenPattiHandView, SessionError> {
        let p = self
            .round
            .as_ref()
            .and_then(|r| r.players.iter().find(|p| p.player_id == player_id))
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_string()))?;
        let visible = p.status == PlayerStatus::Seen || self.phase != TeenPattiPhase::Active;
        Ok(TeenPattiHandView {
            player_id: p.player_id.clone(),
            status: p.status,
            folded: p.folded,
            cards: if visible { p.hand.clone() } else { Vec::new() },
            strength: visible.then(|| evaluate_hand(&p.hand)),
        })
    }

    fn ensure_setup(&self) -> Result<(), SessionError> {
        if self.phase != TeenPattiPhase::Setup {
            return Err(SessionError::RosterLocked);
        }
        Ok(())
    }

    fn check_can_start(&mut self) -> Result<Vec<PlayerId>, SessionError> {
        if !self.active {
            return Err(SessionError::SessionComplete);
        }
        if !matches!(
            self.phase,
            TeenPattiPhase::Setup | TeenPattiPhase::Showdown
        ) {
            return Err(SessionError::wrong_phase(self.phase));
        }
        if self.round_counter > self.config.round_limit {
            self.finish();
            return Err(SessionError::SessionComplete);
        }
        let ids: Vec<PlayerId> = self.roster.named().map(|p| p.id.clone()).collect();
        if ids.len() < MIN_PLAYERS {
            return Err(SessionError::NotEnoughPlayers {
                required: MIN_PLAYERS,
                available: ids.len(),
            });
        }
        if ids.len() > MAX_PLAYERS {
            return Err(SessionError::TooManyPlayers {
                count: ids.len(),
                max: MAX_PLAYERS,
            });
        }
        Ok(ids)
    }

    fn deal(&mut self, ids: Vec<PlayerId>, mut deck: Deck<Card>) -> Result<(), SessionError> {
        let boot = self.config.boot_amount;
        let mut players: Vec<RoundPlayer> = ids
            .into_iter()
            .map(|player_id| RoundPlayer {
                player_id,
                hand: Vec::with_capacity(TEEN_PATTI_HAND_SIZE),
                status: PlayerStatus::Blind,
                folded: false,
                invested: boot,
            })
            .collect();
        // one card at a time around the table
        for _ in 0..TEEN_PATTI_HAND_SIZE {
            for p in players.iter_mut() {
                let card = deck
                    .deal_card()
                    .ok_or_else(|| SessionError::illegal("deck ran out while dealing"))?;
                p.hand.push(card);
            }
        }
        let pot = boot * players.len() as u64;
        let count = players.len();
        self.requests.clear();
        self.round = Some(TeenPattiRound {
            players,
            pot,
            stake: self.config.initial_stake,
            current: 0,
        });
        self.phase = TeenPattiPhase::Active;
        self.log.push(
            self.round_counter,
            format!(
                "Round {} started with {} players, pot {}",
                self.round_counter, count, pot
            ),
        );
        info!(session_id = %self.id, round = self.round_counter, players = count, pot, "round started");
        self.emit_state();
        Ok(())
    }

    /// `Ok(false)` means the action was valid but changed nothing.
    fn apply(&mut self, action: TeenPattiAction) -> Result<bool, SessionError> {
        match action {
            TeenPattiAction::ExpireRequest { kind, request_id } => {
                return Ok(self.expire(kind, request_id))
            }
            TeenPattiAction::CancelRequest { player_id, kind } => {
                self.cancel(&player_id, kind)?;
                return Ok(true);
            }
            _ => {}
        }
        if self.phase != TeenPattiPhase::Active {
            return Err(if self.active {
                SessionError::wrong_phase(self.phase)
            } else {
                SessionError::SessionComplete
            });
        }
        match action {
            TeenPattiAction::Seen { player_id } => self.seen(&player_id),
            TeenPattiAction::Fold { player_id } => self.fold(&player_id),
            TeenPattiAction::Bet {
                player_id,
                amount,
                double,
            } => self.bet(&player_id, amount, double),
            TeenPattiAction::SideShowRequest {
                player_id,
                target_id,
            } => self.side_show_request(&player_id, &target_id),
            TeenPattiAction::SideShowResolve { winner_id } => self.side_show_resolve(&winner_id),
            TeenPattiAction::Show { player_id } => self.show(&player_id),
            TeenPattiAction::ForceShow {
                player_id,
                target_id,
            } => self.force_show(&player_id, &target_id),
            TeenPattiAction::ShowResolve { winner_id } => self.show_resolve(&winner_id),
            TeenPattiAction::CancelRequest { .. } | TeenPattiAction::ExpireRequest { .. } => {
                Ok(())
            }
        }?;
        Ok(true)
    }

    /// Round state for an action taken in turn, with no request outstanding.
    fn turn_round(&mut self, player_id: &str) -> Result<(usize, &mut TeenPattiRound), SessionError> {
        if let Some(req) = self.requests.first() {
            return Err(SessionError::RequestPending(req.kind));
        }
        let round = self
            .round
            .as_mut()
            .ok_or_else(|| SessionError::wrong_phase(TeenPattiPhase::Setup))?;
        let idx = round.require_turn(player_id)?;
        Ok((idx, round))
    }

    fn seen(&mut self, player_id: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        if round.players[idx].status == PlayerStatus::Seen {
            return Err(SessionError::illegal("cards already seen"));
        }
        round.players[idx].status = PlayerStatus::Seen;
        let name = self.roster.name_of(player_id);
        self.log
            .push(self.round_counter, format!("{} looked at their cards", name));
        Ok(())
    }

    fn fold(&mut self, player_id: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        round.players[idx].folded = true;
        let name = self.roster.name_of(player_id);
        self.log.push(self.round_counter, format!("{} folded", name));
        self.settle_or_advance(idx, HandEndReason::LastPlayerStanding);
        Ok(())
    }

    fn bet(&mut self, player_id: &str, amount: Option<u64>, double: bool) -> Result<(), SessionError> {
        let request = BetRequest::from_payload(amount, double)?;
        let stake_limit = self.config.stake_limit;
        let (idx, round) = self.turn_round(player_id)?;
        let status = round.players[idx].status;
        let bet = validate_bet(status, round.stake, stake_limit, request)?;
        round.charge(idx, bet.cost);
        round.stake = bet.new_stake;
        let (pot, stake) = (round.pot, round.stake);
        round.advance_from(idx);
        let name = self.roster.name_of(player_id);
        let how = match status {
            PlayerStatus::Blind => "blind",
            PlayerStatus::Seen => "seen",
        };
        self.log.push(
            self.round_counter,
            format!(
                "{} bet {} {} (stake {}, pot {})",
                name, bet.cost, how, stake, pot
            ),
        );
        Ok(())
    }

    fn side_show_request(&mut self, player_id: &str, target_id: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        if round.players[idx].status != PlayerStatus::Seen {
            return Err(SessionError::illegal("only a seen player may ask for a side show"));
        }
        if player_id == target_id {
            return Err(SessionError::InvalidTarget(
                "cannot ask yourself for a side show".to_string(),
            ));
        }
        let target = round.index_of(target_id).ok_or_else(|| {
            SessionError::InvalidTarget(format!("{} is not in this hand", target_id))
        })?;
        if round.players[target].folded {
            return Err(SessionError::InvalidTarget(format!(
                "{} has folded",
                target_id
            )));
        }
        if round.players[target].status == PlayerStatus::Blind {
            return Err(SessionError::InvalidTarget(format!(
                "{} is still blind",
                target_id
            )));
        }
        let cost = stake_cost(PlayerStatus::Seen, round.stake);
        self.requests
            .open(RequestKind::SideShow, player_id, Some(target_id))?;
        if let Some(round) = self.round.as_mut() {
            round.charge(idx, cost);
        }
        let (name, target_name) = (self.roster.name_of(player_id), self.roster.name_of(target_id));
        self.log.push(
            self.round_counter,
            format!("{} asked {} for a side show ({})", name, target_name, cost),
        );
        Ok(())
    }

    fn side_show_resolve(&mut self, winner_id: &str) -> Result<(), SessionError> {
        let req = self
            .requests
            .get(RequestKind::SideShow)
            .cloned()
            .ok_or(SessionError::NoPendingRequest(RequestKind::SideShow))?;
        let target_id = req.target.clone().unwrap_or_default();
        let loser_id = if winner_id == req.requester {
            target_id
        } else if winner_id == target_id {
            req.requester.clone()
        } else {
            return Err(SessionError::InvalidTarget(format!(
                "{} is not part of the side show",
                winner_id
            )));
        };
        let round = self
            .round
            .as_mut()
            .ok_or(SessionError::NoPendingRequest(RequestKind::SideShow))?;
        let (Some(requester), Some(loser)) = (round.index_of(&req.requester), round.index_of(&loser_id))
        else {
            return Err(SessionError::PlayerNotFound(loser_id));
        };
        round.players[loser].folded = true;
        self.requests.close(RequestKind::SideShow);
        let (winner, loser_name) = (self.roster.name_of(winner_id), self.roster.name_of(&loser_id));
        self.log.push(
            self.round_counter,
            format!("{} won the side show, {} folds", winner, loser_name),
        );
        self.settle_or_advance(requester, HandEndReason::SideShow);
        Ok(())
    }

    fn show(&mut self, player_id: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        if round.unfolded() != 2 {
            return Err(SessionError::illegal("a show needs exactly two players left"));
        }
        let other = round
            .players
            .iter()
            .enumerate()
            .find(|(i, p)| *i != idx && !p.folded)
            .map(|(_, p)| p.player_id.clone())
            .ok_or_else(|| SessionError::illegal("no opponent left to show against"))?;
        let cost = stake_cost(round.players[idx].status, round.stake);
        self.requests
            .open(RequestKind::Show, player_id, Some(other.as_str()))?;
        if let Some(round) = self.round.as_mut() {
            round.charge(idx, cost);
        }
        let name = self.roster.name_of(player_id);
        self.log
            .push(self.round_counter, format!("{} called for a show ({})", name, cost));
        Ok(())
    }

    fn force_show(&mut self, player_id: &str, target_id: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        if round.players[idx].status != PlayerStatus::Seen {
            return Err(SessionError::illegal("only a seen player may force a show"));
        }
        if player_id == target_id {
            return Err(SessionError::InvalidTarget(
                "cannot force a show on yourself".to_string(),
            ));
        }
        let target = round.index_of(target_id).ok_or_else(|| {
            SessionError::InvalidTarget(format!("{} is not in this hand", target_id))
        })?;
        let t = &round.players[target];
        if t.folded {
            return Err(SessionError::InvalidTarget(format!(
                "{} has folded",
                target_id
            )));
        }
        if t.status != PlayerStatus::Blind {
            return Err(SessionError::InvalidTarget(format!(
                "{} has already seen their cards",
                target_id
            )));
        }
        let blind_left = round
            .players
            .iter()
            .filter(|p| !p.folded && p.status == PlayerStatus::Blind)
            .count();
        if blind_left > 2 {
            return Err(SessionError::illegal(
                "a force show is only allowed while at most two blind players remain",
            ));
        }
        self.requests
            .open(RequestKind::ForceShow, player_id, Some(target_id))?;
        let (name, target_name) = (self.roster.name_of(player_id), self.roster.name_of(target_id));
        self.log.push(
            self.round_counter,
            format!("{} forced a show on {}", name, target_name),
        );
        Ok(())
    }

    fn show_resolve(&mut self, winner_id: &str) -> Result<(), SessionError> {
        let req = self
            .requests
            .get(RequestKind::Show)
            .or_else(|| self.requests.get(RequestKind::ForceShow))
            .cloned()
            .ok_or(SessionError::NoPendingRequest(RequestKind::Show))?;
        if !req.involves(winner_id) {
            return Err(SessionError::InvalidTarget(format!(
                "{} is not part of the {}",
                winner_id, req.kind
            )));
        }
        let round = self
            .round
            .as_mut()
            .ok_or(SessionError::NoPendingRequest(req.kind))?;
        let winner = round
            .index_of(winner_id)
            .ok_or_else(|| SessionError::PlayerNotFound(winner_id.to_string()))?;
        let requester = round
            .index_of(&req.requester)
            .ok_or_else(|| SessionError::PlayerNotFound(req.requester.clone()))?;

        if req.kind == RequestKind::Show {
            self.requests.close(RequestKind::Show);
            self.end_hand(winner, HandEndReason::Show);
            return Ok(());
        }

        let target_id = req.target.clone().unwrap_or_default();
        let target = round
            .index_of(&target_id)
            .ok_or_else(|| SessionError::PlayerNotFound(target_id.clone()))?;
        let message = if winner == requester {
            round.players[target].folded = true;
            format!(
                "{} won the force show, {} folds",
                self.roster.name_of(&req.requester),
                self.roster.name_of(&target_id)
            )
        } else {
            let penalty = round.stake.saturating_mul(2);
            round.charge(requester, penalty);
            round.players[requester].folded = true;
            format!(
                "{} lost the force show, pays {} and folds",
                self.roster.name_of(&req.requester),
                penalty
            )
        };
        self.requests.close(RequestKind::ForceShow);
        self.log.push(self.round_counter, message);
        self.settle_or_advance(requester, HandEndReason::ForceShow);
        Ok(())
    }

    fn cancel(&mut self, player_id: &str, kind: RequestKind) -> Result<(), SessionError> {
        let req = self
            .requests
            .get(kind)
            .ok_or(SessionError::NoPendingRequest(kind))?;
        if !req.involves(player_id) {
            return Err(SessionError::illegal(format!(
                "{} is not part of the {}",
                player_id, kind
            )));
        }
        let requester = req.requester.clone();
        self.requests.close(kind);
        let name = self.roster.name_of(player_id);
        self.log
            .push(self.round_counter, format!("{} cancelled the {}", name, kind));
        self.pass_turn_after(&requester);
        Ok(())
    }

    fn expire(&mut self, kind: RequestKind, request_id: u64) -> bool {
        let Some(req) = self.requests.expire(kind, request_id) else {
            debug!(session_id = %self.id, %kind, request_id, "stale request timer ignored");
            return false;
        };
        let name = self.roster.name_of(&req.requester);
        self.log.push(
            self.round_counter,
            format!("{}'s {} request timed out", name, kind),
        );
        info!(session_id = %self.id, %kind, request_id, "request expired");
        self.pass_turn_after(&req.requester);
        true
    }

    fn pass_turn_after(&mut self, requester: &str) {
        if self.phase != TeenPattiPhase::Active {
            return;
        }
        if let Some(round) = self.round.as_mut() {
            if let Some(idx) = round.index_of(requester) {
                round.advance_from(idx);
            }
        }
    }

    fn settle_or_advance(&mut self, from: usize, reason: HandEndReason) {
        match self.round.as_ref().and_then(TeenPattiRound::sole_survivor) {
            Some(winner) => self.end_hand(winner, reason),
            None => {
                if let Some(round) = self.round.as_mut() {
                    round.advance_from(from);
                }
            }
        }
    }

    /// Pays the pot to `winner` and settles every dealt-in player.
    fn end_hand(&mut self, winner: usize, reason: HandEndReason) {
        self.requests.clear();
        let Some(round) = self.round.as_ref() else {
            return;
        };
        let pot = round.pot;
        let winner_id = round.players[winner].player_id.clone();
        let mut deltas = Vec::with_capacity(round.players.len());
        for (i, p) in round.players.iter().enumerate() {
            let invested = p.invested as i64;
            let net = if i == winner { pot as i64 - invested } else { -invested };
            let (name, balance) = match self.roster.get_mut(&p.player_id) {
                Some(rp) => {
                    rp.balance += net;
                    (rp.name.clone(), rp.balance)
                }
                None => (String::new(), net),
            };
            deltas.push(PlayerDelta {
                player_id: p.player_id.clone(),
                name,
                invested: p.invested,
                net,
                balance,
            });
        }
        let played = self.round_counter;
        self.round_counter += 1;
        let is_session_over = self.round_counter > self.config.round_limit;
        self.phase = TeenPattiPhase::Showdown;
        let winner_name = self.roster.name_of(&winner_id);
        self.log.push(
            played,
            format!("{} wins the pot of {}", winner_name, pot),
        );
        info!(session_id = %self.id, round = played, winner = %winner_id, pot, ?reason, "hand complete");
        self.events.push(SessionEvent::HandComplete {
            summary: HandSummary {
                session_id: self.id.clone(),
                round: played,
                winner_id,
                winner_name,
                pot,
                reason,
                deltas,
                is_session_over,
            },
        });
        if is_session_over {
            self.finish();
        }
    }

    fn finish(&mut self) {
        self.active = false;
        self.phase = TeenPattiPhase::Ended;
        let mut standings: Vec<Standing> = self.roster.players().iter().map(Standing::from).collect();
        standings.sort_by(|a, b| b.balance.cmp(&a.balance).then(a.seat.cmp(&b.seat)));
        let winner = standings.first().cloned();
        if let Some(w) = &winner {
            self.log
                .push(self.round_counter, format!("Session over, {} leads with {}", w.name, w.balance));
        }
        info!(session_id = %self.id, rounds = self.round_counter - 1, "session ended");
        self.events.push(SessionEvent::SessionEnded {
            summary: FinalSummary {
                session_id: self.id.clone(),
                session_name: self.name.clone(),
                rounds_played: self.round_counter - 1,
                winner,
                standings,
            },
        });
    }

    fn emit_state(&mut self) {
        let state = PublicState::TeenPatti(self.public_state());
        self.events.push(SessionEvent::StateChange { state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cards(codes: &[&str]) -> Vec<Card> {
        codes.iter().map(|c| c.parse().unwrap()).collect()
    }

    fn session(players: usize) -> TeenPattiSession {
        let cfg = TeenPattiConfig {
            round_limit: 3,
            boot_amount: 5,
            initial_stake: 20,
            ..Default::default()
        };
        let mut s = TeenPattiSession::new("t", "table", cfg).unwrap();
        let roster = (1..=players)
            .map(|i| RosterPlayer::new(format!("p{}", i), format!("P{}", i)))
            .collect();
        s.set_players(roster).unwrap();
        s
    }

    // p1: AS KS QS, p2: 2C 5D 9H, p3: 7C 7D 3H (dealt round-robin)
    fn prepared() -> Vec<Card> {
        cards(&["AS", "2C", "7C", "KS", "5D", "7D", "QS", "9H", "3H"])
    }

    fn act(s: &mut TeenPattiSession, a: TeenPattiAction) -> Result<(), SessionError> {
        s.handle_action(a)
    }

    fn seen(id: &str) -> TeenPattiAction {
        TeenPattiAction::Seen { player_id: id.into() }
    }

    fn chaal(id: &str) -> TeenPattiAction {
        TeenPattiAction::Bet {
            player_id: id.into(),
            amount: None,
            double: false,
        }
    }

    #[test]
    fn deal_is_round_robin() {
        let mut s = session(3);
        s.start_round_with_deck(prepared()).unwrap();
        act(&mut s, seen("p1")).unwrap();
        let view = s.player_hand("p1").unwrap();
        assert_eq!(view.cards, cards(&["AS", "KS", "QS"]));
        assert_eq!(view.strength.unwrap().category, crate::hand::Category::PureSequence);
    }

    #[test]
    fn blind_hand_is_hidden() {
        let mut s = session(2);
        s.start_round().unwrap();
        let view = s.player_hand("p2").unwrap();
        assert!(view.cards.is_empty());
        assert!(view.strength.is_none());
    }

    #[test]
    fn turn_order_is_enforced() {
        let mut s = session(3);
        s.start_round().unwrap();
        let err = act(&mut s, chaal("p2")).unwrap_err();
        assert!(matches!(err, SessionError::NotYourTurn { .. }));
        act(&mut s, chaal("p1")).unwrap();
        assert_eq!(s.current_player(), Some("p2"));
    }

    #[test]
    fn seen_keeps_the_turn() {
        let mut s = session(2);
        s.start_round().unwrap();
        act(&mut s, seen("p1")).unwrap();
        assert_eq!(s.current_player(), Some("p1"));
        assert!(act(&mut s, seen("p1")).is_err());
    }

    #[test]
    fn rejected_action_leaves_state_untouched() {
        let mut s = session(3);
        s.start_round().unwrap();
        s.drain_events();
        let before = s.public_state();
        assert!(act(&mut s, chaal("p3")).is_err());
        assert_eq!(s.public_state(), before);
        assert!(s.drain_events().is_empty());
    }

    #[test]
    fn side_show_flow_folds_loser_and_passes_turn() {
        let mut s = session(3);
        s.start_round_with_deck(prepared()).unwrap();
        act(&mut s, seen("p1")).unwrap();
        act(&mut s, chaal("p1")).unwrap();
        act(&mut s, seen("p2")).unwrap();
        act(&mut s, chaal("p2")).unwrap();
        act(&mut s, seen("p3")).unwrap();
        act(
            &mut s,
            TeenPattiAction::SideShowRequest {
                player_id: "p3".into(),
                target_id: "p2".into(),
            },
        )
        .unwrap();
        assert_eq!(s.pot(), 15 + 20 + 20 + 20);
        assert!(matches!(
            act(&mut s, chaal("p3")),
            Err(SessionError::RequestPending(RequestKind::SideShow))
        ));
        act(&mut s, TeenPattiAction::SideShowResolve { winner_id: "p3".into() }).unwrap();
        let state = s.public_state();
        assert!(state.players[1].folded);
        assert_eq!(s.current_player(), Some("p1"));
        assert!(s.pending_request(RequestKind::SideShow).is_none());
    }

    #[test]
    fn force_show_loss_costs_double_stake() {
        let mut s = session(2);
        s.start_round_with_deck(cards(&["2C", "AS", "5D", "AD", "9H", "AH"])).unwrap();
        act(&mut s, seen("p1")).unwrap();
        act(
            &mut s,
            TeenPattiAction::ForceShow {
                player_id: "p1".into(),
                target_id: "p2".into(),
            },
        )
        .unwrap();
        act(&mut s, TeenPattiAction::ShowResolve { winner_id: "p2".into() }).unwrap();
        let events = s.drain_events();
        let summary = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::HandComplete { summary } => Some(summary.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.winner_id, "p2");
        assert_eq!(summary.pot, 10 + 40);
        assert_eq!(summary.deltas[0].net, -45);
        assert_eq!(summary.deltas[1].net, 45);
    }

    #[test]
    fn show_requires_two_players() {
        let mut s = session(3);
        s.start_round().unwrap();
        let err = act(&mut s, TeenPattiAction::Show { player_id: "p1".into() }).unwrap_err();
        assert!(matches!(err, SessionError::IllegalAction(_)));
    }

    #[test]
    fn roster_is_locked_after_start() {
        let mut s = session(2);
        s.start_round().unwrap();
        assert_eq!(
            s.add_player(RosterPlayer::new("p9", "late")).unwrap_err(),
            SessionError::RosterLocked
        );
    }

    #[test]
    fn not_enough_named_players() {
        let mut s = TeenPattiSession::new("t", "n", TeenPattiConfig::default()).unwrap();
        s.set_players(vec![RosterPlayer::new("a", "A"), RosterPlayer::new("b", "")])
            .unwrap();
        assert!(matches!(
            s.start_round(),
            Err(SessionError::NotEnoughPlayers { available: 1, .. })
        ));
    }

    #[test]
    fn stale_expiry_changes_nothing() {
        let mut s = session(2);
        s.start_round().unwrap();
        s.drain_events();
        let before = s.public_state();
        s.handle_action(TeenPattiAction::ExpireRequest {
            kind: RequestKind::SideShow,
            request_id: 99,
        })
        .unwrap();
        assert_eq!(s.public_state(), before);
        assert!(s.drain_events().is_empty());
    }
}
