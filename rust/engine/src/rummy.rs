//! Meld-game session machine.
//!
//! A round runs `DropPhase -> Play -> Showdown`. A player who drops before
//! their first draw pays the lighter penalty; after it dropping costs the
//! middle-drop penalty. `DropPhase` ends once every player still in has
//! drawn. A declaration moves the round to `Showdown` and waits for a resolve
//! action carrying the host's verdict.

use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cards::Rank;
use crate::config::{RummyConfig, SessionLimit};
use crate::deck::{session_rng, shuffle, Deck, SessionRng};
use crate::errors::SessionError;
use crate::events::{FinalSummary, PublicState, SessionEvent, Standing};
use crate::logger::{LogEntry, SessionLog, PUBLIC_LOG_TAIL};
use crate::meld::{
    build_deck, evaluate_rummy_hand, wild_rank_for, RummyCard, RummyEvaluation, RUMMY_HAND_SIZE,
};
use crate::player::{PlayerId, Roster, RosterPlayer};
use crate::timers::{PendingRequest, RequestBook, RequestKind, TimerCommand};
use crate::turns::{active_count, next_active};

pub const MIN_PLAYERS: usize = 2;
/// A single deck leaves a draw pile for at most four hands.
pub const MAX_PLAYERS: usize = 4;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RummyPhase {
    Setup,
    DropPhase,
    Play,
    Showdown,
    Ended,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RummyPlayerStatus {
    Playing,
    Dropped,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PileSource {
    DrawPile,
    DiscardPile,
}

impl fmt::Display for PileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PileSource::DrawPile => f.write_str("draw pile"),
            PileSource::DiscardPile => f.write_str("discard pile"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RummyAction {
    DropPlayer {
        player_id: PlayerId,
    },
    DrawCard {
        player_id: PlayerId,
        source: PileSource,
    },
    /// `card` is a card code such as `"QH"` or `"JK1"`.
    DiscardCard {
        player_id: PlayerId,
        card: String,
    },
    ShowClosedJoker {
        player_id: PlayerId,
    },
    /// With 14 cards in hand `finish_card` names the card laid face down.
    DeclareRummy {
        player_id: PlayerId,
        #[serde(default)]
        finish_card: Option<String>,
    },
    ResolveDeclare {
        #[serde(default)]
        winner_id: Option<PlayerId>,
        is_valid: bool,
    },
    CancelRequest {
        player_id: PlayerId,
        kind: RequestKind,
    },
    ExpireRequest {
        kind: RequestKind,
        request_id: u64,
    },
}

impl RummyAction {
    pub fn name(&self) -> &'static str {
        match self {
            RummyAction::DropPlayer { .. } => "DROP_PLAYER",
            RummyAction::DrawCard { .. } => "DRAW_CARD",
            RummyAction::DiscardCard { .. } => "DISCARD_CARD",
            RummyAction::ShowClosedJoker { .. } => "SHOW_CLOSED_JOKER",
            RummyAction::DeclareRummy { .. } => "DECLARE_RUMMY",
            RummyAction::ResolveDeclare { .. } => "RESOLVE_DECLARE",
            RummyAction::CancelRequest { .. } => "CANCEL_REQUEST",
            RummyAction::ExpireRequest { .. } => "EXPIRE_REQUEST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RummyPlayerResult {
    pub player_id: PlayerId,
    pub name: String,
    pub status: RummyPlayerStatus,
    /// Points charged this round, after the cap.
    pub points: u32,
    /// Chips won (positive) or paid (negative) this round.
    pub chips: i64,
    pub total_score: i64,
    pub eliminated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RummyRoundSummary {
    pub session_id: String,
    pub round: u32,
    pub winner_id: Option<PlayerId>,
    pub declarer_id: Option<PlayerId>,
    pub declaration_valid: Option<bool>,
    pub wild_rank: Rank,
    pub results: Vec<RummyPlayerResult>,
    /// Lowest cumulative score first.
    pub leaderboard: Vec<Standing>,
    pub is_session_over: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RummyPlayerView {
    pub player_id: PlayerId,
    pub name: String,
    pub seat: usize,
    pub score: i64,
    pub balance: i64,
    pub eliminated: bool,
    pub in_round: bool,
    pub status: Option<RummyPlayerStatus>,
    pub card_count: usize,
    pub round_points: Option<u32>,
    pub joker_revealed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RummyPublicState {
    pub session_id: String,
    pub session_name: String,
    pub phase: RummyPhase,
    pub is_active: bool,
    pub round: u32,
    pub limit: SessionLimit,
    pub current_player: Option<PlayerId>,
    pub draw_pile_count: usize,
    pub discard_top: Option<RummyCard>,
    pub discard_count: usize,
    /// Revealed to everyone only once the round is over.
    pub wild_rank: Option<Rank>,
    pub declared_by: Option<PlayerId>,
    pub players: Vec<RummyPlayerView>,
    pub pending_requests: Vec<PendingRequest>,
    pub log: Vec<LogEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RummyHandView {
    pub player_id: PlayerId,
    pub status: RummyPlayerStatus,
    pub cards: Vec<RummyCard>,
    /// Known after showing the closed joker, or once the round is over.
    pub wild_rank: Option<Rank>,
    pub evaluation: Option<RummyEvaluation>,
}

#[derive(Debug, Clone)]
struct RummyRoundPlayer {
    player_id: PlayerId,
    hand: Vec<RummyCard>,
    status: RummyPlayerStatus,
    points: Option<u32>,
    joker_revealed: bool,
    /// Drew at least once this round; a later drop is a middle drop.
    has_drawn: bool,
}

#[derive(Debug, Clone)]
struct Declaration {
    player: usize,
    finish_card: Option<RummyCard>,
    evaluation: RummyEvaluation,
    /// Whether the declarer had drawn this turn.
    had_drawn: bool,
}

/// Per-round play state, replaced wholesale by every `start_round`.
#[derive(Debug, Clone)]
struct RummyRound {
    players: Vec<RummyRoundPlayer>,
    /// Top of the pile is the last element.
    draw_pile: Vec<RummyCard>,
    discard_pile: Vec<RummyCard>,
    wild_rank: Rank,
    current: usize,
    drawn: bool,
    declaration: Option<Declaration>,
}

impl RummyRound {
    fn index_of(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|p| p.player_id == player_id)
    }

    /// Every player still in has either drawn or dropped.
    fn drop_phase_over(&self) -> bool {
        self.players
            .iter()
            .all(|p| p.status != RummyPlayerStatus::Playing || p.has_drawn)
    }

    fn playing(&self) -> usize {
        active_count(self.players.len(), |i| {
            self.players[i].status == RummyPlayerStatus::Playing
        })
    }

    fn advance_from(&mut self, from: usize) {
        let players = &self.players;
        if let Some(next) = next_active(players.len(), from, |i| {
            players[i].status == RummyPlayerStatus::Playing
        }) {
            self.current = next;
        }
        self.drawn = false;
    }

    fn require_turn(&self, player_id: &str) -> Result<usize, SessionError> {
        let idx = self
            .index_of(player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_string()))?;
        if self.players[idx].status == RummyPlayerStatus::Dropped {
            return Err(SessionError::illegal(format!("{} has dropped", player_id)));
        }
        if idx != self.current {
            return Err(SessionError::NotYourTurn {
                expected: self.players[self.current].player_id.clone(),
                actual: player_id.to_string(),
            });
        }
        Ok(idx)
    }

    fn hand_position(&self, idx: usize, code: &str) -> Result<usize, SessionError> {
        let card: RummyCard = code
            .parse()
            .map_err(|_| SessionError::CardNotInHand(code.to_string()))?;
        self.players[idx]
            .hand
            .iter()
            .position(|c| *c == card)
            .ok_or_else(|| SessionError::CardNotInHand(card.code()))
    }
}

/// One meld-game session.
#[derive(Debug)]
pub struct RummySession {
    id: String,
    name: String,
    config: RummyConfig,
    phase: RummyPhase,
    active: bool,
    round_counter: u32,
    roster: Roster,
    round: Option<RummyRound>,
    requests: RequestBook,
    log: SessionLog,
    events: Vec<SessionEvent>,
    rng: SessionRng,
}

impl RummySession {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        config: RummyConfig,
    ) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            phase: RummyPhase::Setup,
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

    pub fn config(&self) -> &RummyConfig {
        &self.config
    }

    pub fn phase(&self) -> RummyPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn is_session_over(&self) -> bool {
        !self.active
    }

    pub fn round_number(&self) -> u32 {
        self.round_counter
    }

    pub fn roster(&self) -> &[RosterPlayer] {
        self.roster.players()
    }

    pub fn log(&self) -> &[LogEntry] {
        self.log.entries()
    }

    pub fn current_player(&self) -> Option<&str> {
        if !matches!(self.phase, RummyPhase::DropPhase | RummyPhase::Play) {
            return None;
        }
        let round = self.round.as_ref()?;
        Some(round.players[round.current].player_id.as_str())
    }

    pub fn discard_pile(&self) -> &[RummyCard] {
        self.round.as_ref().map_or(&[], |r| &r.discard_pile)
    }

    pub fn draw_pile_len(&self) -> usize {
        self.round.as_ref().map_or(0, |r| r.draw_pile.len())
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

    pub fn start_round(&mut self) -> Result<(), SessionError> {
        let ids = self.check_can_start()?;
        let deck = Deck::shuffled(build_deck(self.config.printed_jokers), &mut self.rng);
        self.deal(ids, deck)
    }

    /// Deals from `cards` in the given order: 13 cards round-robin, then the
    /// closed joker, the rest forming the draw pile.
    pub fn start_round_with_deck(&mut self, cards: Vec<RummyCard>) -> Result<(), SessionError> {
        let ids = self.check_can_start()?;
        let needed = ids.len() * RUMMY_HAND_SIZE + 1;
        if cards.len() < needed {
            return Err(SessionError::illegal(format!(
                "prepared deck holds {} cards, {} players need {}",
                cards.len(),
                ids.len(),
                needed
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

    pub fn handle_action(&mut self, action: RummyAction) -> Result<(), SessionError> {
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

    pub fn public_state(&self) -> RummyPublicState {
        let round = self.round.as_ref();
        let over = matches!(self.phase, RummyPhase::Showdown | RummyPhase::Ended)
            && !self.requests_open();
        let players = self
            .roster
            .players()
            .iter()
            .map(|rp| {
                let p = round.and_then(|r| r.players.iter().find(|p| p.player_id == rp.id));
                RummyPlayerView {
                    player_id: rp.id.clone(),
                    name: rp.name.clone(),
                    seat: rp.seat,
                    score: rp.score,
                    balance: rp.balance,
                    eliminated: rp.eliminated,
                    in_round: p.is_some(),
                    status: p.map(|p| p.status),
                    card_count: p.map_or(0, |p| p.hand.len()),
                    round_points: p.and_then(|p| p.points),
                    joker_revealed: p.is_some_and(|p| p.joker_revealed),
                }
            })
            .collect();
        RummyPublicState {
            session_id: self.id.clone(),
            session_name: self.name.clone(),
            phase: self.phase,
            is_active: self.active,
            round: self.round_counter,
            limit: self.config.limit,
            current_player: self.current_player().map(str::to_string),
            draw_pile_count: round.map_or(0, |r| r.draw_pile.len()),
            discard_top: round.and_then(|r| r.discard_pile.last().copied()),
            discard_count: round.map_or(0, |r| r.discard_pile.len()),
            wild_rank: if over { round.map(|r| r.wild_rank) } else { None },
            declared_by: round.and_then(|r| {
                r.declaration
                    .as_ref()
                    .map(|d| r.players[d.player].player_id.clone())
            }),
            players,
            pending_requests: self.requests.pending(),
            log: self.log.tail(PUBLIC_LOG_TAIL),
        }
    }

    /// The owner's view of their hand.
    pub fn player_hand(&self, player_id: &str) -> Result<RummyHandView, SessionError> {
        let round = self
            .round
            .as_ref()
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_string()))?;
        let p = round
            .players
            .iter()
            .find(|p| p.player_id == player_id)
            .ok_or_else(|| SessionError::PlayerNotFound(player_id.to_string()))?;
        let round_over = matches!(self.phase, RummyPhase::Showdown | RummyPhase::Ended)
            && !self.requests_open();
        let wild = (p.joker_revealed || round_over).then_some(round.wild_rank);
        let evaluation = match wild {
            Some(w) if (RUMMY_HAND_SIZE..=RUMMY_HAND_SIZE + 1).contains(&p.hand.len()) => {
                Some(evaluate_rummy_hand(&p.hand, w))
            }
            _ => None,
        };
        Ok(RummyHandView {
            player_id: p.player_id.clone(),
            status: p.status,
            cards: p.hand.clone(),
            wild_rank: wild,
            evaluation,
        })
    }

    fn requests_open(&self) -> bool {
        self.requests.first().is_some()
    }

    fn ensure_setup(&self) -> Result<(), SessionError> {
        if self.phase != RummyPhase::Setup {
            return Err(SessionError::RosterLocked);
        }
        Ok(())
    }

    fn limit_reached(&self) -> bool {
        let remaining = self.roster.named().filter(|p| !p.eliminated).count();
        if remaining <= 1 && self.round_counter > 1 {
            return true;
        }
        match self.config.limit {
            SessionLimit::Rounds(n) => self.round_counter > n,
            SessionLimit::Points(_) => false,
        }
    }

    fn check_can_start(&mut self) -> Result<Vec<PlayerId>, SessionError> {
        if !self.active {
            return Err(SessionError::SessionComplete);
        }
        if !matches!(self.phase, RummyPhase::Setup | RummyPhase::Showdown) {
            return Err(SessionError::wrong_phase(self.phase));
        }
        if self.requests_open() {
            return Err(SessionError::RequestPending(RequestKind::Declaration));
        }
        if self.limit_reached() {
            self.finish();
            return Err(SessionError::SessionComplete);
        }
        let ids: Vec<PlayerId> = self
            .roster
            .named()
            .filter(|p| !p.eliminated)
            .map(|p| p.id.clone())
            .collect();
        if ids.len() < MIN_PLAYERS {
            return Err(SessionError::NotEnoughPlayers {
                required: MIN_PLAYERS,
                available: ids.len(),
            });
        }
        let deck_size = 52 + usize::from(self.config.printed_jokers);
        if ids.len() > MAX_PLAYERS || ids.len() * RUMMY_HAND_SIZE + 1 > deck_size {
            return Err(SessionError::TooManyPlayers {
                count: ids.len(),
                max: MAX_PLAYERS.min((deck_size - 1) / RUMMY_HAND_SIZE),
            });
        }
        Ok(ids)
    }

    fn deal(&mut self, ids: Vec<PlayerId>, mut deck: Deck<RummyCard>) -> Result<(), SessionError> {
        let mut players: Vec<RummyRoundPlayer> = ids
            .into_iter()
            .map(|player_id| RummyRoundPlayer {
                player_id,
                hand: Vec::with_capacity(RUMMY_HAND_SIZE + 1),
                status: RummyPlayerStatus::Playing,
                points: None,
                joker_revealed: false,
                has_drawn: false,
            })
            .collect();
        for _ in 0..RUMMY_HAND_SIZE {
            for p in players.iter_mut() {
                let card = deck
                    .deal_card()
                    .ok_or_else(|| SessionError::illegal("deck ran out while dealing"))?;
                p.hand.push(card);
            }
        }
        let closed_joker = deck
            .deal_card()
            .ok_or_else(|| SessionError::illegal("no card left for the closed joker"))?;
        let mut draw_pile = deck.into_remaining();
        draw_pile.reverse();

        let count = players.len();
        let start = (self.round_counter as usize - 1) % count;
        self.requests.clear();
        self.round = Some(RummyRound {
            players,
            draw_pile,
            discard_pile: Vec::new(),
            wild_rank: wild_rank_for(closed_joker),
            current: start,
            drawn: false,
            declaration: None,
        });
        self.phase = RummyPhase::DropPhase;
        self.log.push(
            self.round_counter,
            format!("Round {} dealt to {} players", self.round_counter, count),
        );
        info!(session_id = %self.id, round = self.round_counter, players = count, "round started");
        self.emit_state();
        Ok(())
    }

    fn apply(&mut self, action: RummyAction) -> Result<bool, SessionError> {
        match action {
            RummyAction::ExpireRequest { kind, request_id } => {
                return Ok(self.expire(kind, request_id))
            }
            RummyAction::CancelRequest { player_id, kind } => {
                self.cancel(&player_id, kind)?;
                return Ok(true);
            }
            RummyAction::ResolveDeclare {
                winner_id,
                is_valid,
            } => {
                self.resolve_declare(winner_id.as_deref(), is_valid)?;
                return Ok(true);
            }
            _ => {}
        }
        if !matches!(self.phase, RummyPhase::DropPhase | RummyPhase::Play) {
            return Err(if self.active {
                SessionError::wrong_phase(self.phase)
            } else {
                SessionError::SessionComplete
            });
        }
        match action {
            RummyAction::DropPlayer { player_id } => self.drop_player(&player_id),
            RummyAction::DrawCard { player_id, source } => self.draw(&player_id, source),
            RummyAction::DiscardCard { player_id, card } => self.discard(&player_id, &card),
            RummyAction::ShowClosedJoker { player_id } => self.show_closed_joker(&player_id),
            RummyAction::DeclareRummy {
                player_id,
                finish_card,
            } => self.declare(&player_id, finish_card.as_deref()),
            RummyAction::ResolveDeclare { .. }
            | RummyAction::CancelRequest { .. }
            | RummyAction::ExpireRequest { .. } => Ok(()),
        }?;
        Ok(true)
    }

    fn turn_round(&mut self, player_id: &str) -> Result<(usize, &mut RummyRound), SessionError> {
        let round = self
            .round
            .as_mut()
            .ok_or_else(|| SessionError::wrong_phase(RummyPhase::Setup))?;
        let idx = round.require_turn(player_id)?;
        Ok((idx, round))
    }

    fn drop_player(&mut self, player_id: &str) -> Result<(), SessionError> {
        let (first_drop, middle_drop) = (
            self.config.first_drop_penalty,
            self.config.middle_drop_penalty,
        );
        let cap = self.config.max_round_points;
        let (idx, round) = self.turn_round(player_id)?;
        if round.drawn {
            return Err(SessionError::illegal("discard before dropping"));
        }
        let penalty = if round.players[idx].has_drawn {
            middle_drop
        } else {
            first_drop
        }
        .min(cap);
        round.players[idx].status = RummyPlayerStatus::Dropped;
        round.players[idx].points = Some(penalty);
        let remaining = round.playing();
        let name = self.roster.name_of(player_id);
        self.log.push(
            self.round_counter,
            format!("{} dropped ({} points)", name, penalty),
        );
        match remaining {
            0 => self.end_round(None),
            1 => {
                let winner = self.round.as_ref().and_then(|r| {
                    r.players
                        .iter()
                        .position(|p| p.status == RummyPlayerStatus::Playing)
                });
                if let Some(round) = self.round.as_mut() {
                    if let Some(w) = winner {
                        round.players[w].points = Some(0);
                    }
                }
                self.end_round(winner);
            }
            _ => {
                if let Some(round) = self.round.as_mut() {
                    round.advance_from(idx);
                }
                self.close_drop_phase();
            }
        }
        Ok(())
    }

    fn close_drop_phase(&mut self) {
        let over = self.round.as_ref().is_some_and(RummyRound::drop_phase_over);
        if self.phase == RummyPhase::DropPhase && over {
            self.phase = RummyPhase::Play;
            self.log.push(self.round_counter, "Drop phase over");
        }
    }

    fn draw(&mut self, player_id: &str, source: PileSource) -> Result<(), SessionError> {
        let round = self
            .round
            .as_mut()
            .ok_or_else(|| SessionError::wrong_phase(RummyPhase::Setup))?;
        let idx = round.require_turn(player_id)?;
        if round.drawn {
            return Err(SessionError::illegal("already drew this turn"));
        }
        let mut reshuffled = false;
        let card = match source {
            PileSource::DiscardPile => round
                .discard_pile
                .pop()
                .ok_or_else(|| SessionError::EmptyPile(source.to_string()))?,
            PileSource::DrawPile => {
                if round.draw_pile.is_empty() {
                    if round.discard_pile.len() < 2 {
                        return Err(SessionError::PilesExhausted);
                    }
                    let top = round.discard_pile.pop();
                    let mut rest = std::mem::take(&mut round.discard_pile);
                    shuffle(&mut rest, &mut self.rng);
                    round.draw_pile = rest;
                    round.discard_pile.extend(top);
                    reshuffled = true;
                }
                round.draw_pile.pop().ok_or(SessionError::PilesExhausted)?
            }
        };
        round.players[idx].hand.push(card);
        round.players[idx].has_drawn = true;
        round.drawn = true;
        let name = self.roster.name_of(player_id);
        if reshuffled {
            self.log
                .push(self.round_counter, "Discard pile reshuffled into the draw pile");
        }
        match source {
            PileSource::DiscardPile => self.log.push(
                self.round_counter,
                format!("{} took {} from the discard pile", name, card),
            ),
            PileSource::DrawPile => self
                .log
                .push(self.round_counter, format!("{} drew from the draw pile", name)),
        };
        self.close_drop_phase();
        Ok(())
    }

    fn discard(&mut self, player_id: &str, code: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        if !round.drawn {
            return Err(SessionError::illegal("draw before discarding"));
        }
        let pos = round.hand_position(idx, code)?;
        let card = round.players[idx].hand.remove(pos);
        round.discard_pile.push(card);
        round.advance_from(idx);
        let name = self.roster.name_of(player_id);
        self.log
            .push(self.round_counter, format!("{} discarded {}", name, card));
        Ok(())
    }

    fn show_closed_joker(&mut self, player_id: &str) -> Result<(), SessionError> {
        let (idx, round) = self.turn_round(player_id)?;
        let p = &round.players[idx];
        if p.joker_revealed {
            return Err(SessionError::illegal("closed joker already shown"));
        }
        if !evaluate_rummy_hand(&p.hand, round.wild_rank).has_pure_sequence() {
            return Err(SessionError::illegal(
                "a pure sequence is needed to see the closed joker",
            ));
        }
        round.players[idx].joker_revealed = true;
        let name = self.roster.name_of(player_id);
        self.log
            .push(self.round_counter, format!("{} looked at the closed joker", name));
        Ok(())
    }

    fn declare(&mut self, player_id: &str, finish: Option<&str>) -> Result<(), SessionError> {
        self.requests.ensure_free(RequestKind::Declaration)?;
        let (idx, round) = self.turn_round(player_id)?;
        let hand_len = round.players[idx].hand.len();
        let finish_pos = match (hand_len > RUMMY_HAND_SIZE, finish) {
            (true, Some(code)) => Some(round.hand_position(idx, code)?),
            (true, None) => {
                return Err(SessionError::illegal(
                    "name the card to finish with when holding 14 cards",
                ))
            }
            (false, Some(_)) => {
                return Err(SessionError::illegal(
                    "a 13-card hand declares without a finishing card",
                ))
            }
            (false, None) => None,
        };
        let mut remaining = round.players[idx].hand.clone();
        let finish_card = finish_pos.map(|pos| remaining.remove(pos));
        let evaluation = evaluate_rummy_hand(&remaining, round.wild_rank);

        round.players[idx].hand = remaining;
        round.declaration = Some(Declaration {
            player: idx,
            finish_card,
            evaluation,
            had_drawn: round.drawn,
        });
        self.requests
            .open(RequestKind::Declaration, player_id, None)?;
        self.phase = RummyPhase::Showdown;
        let name = self.roster.name_of(player_id);
        self.log.push(self.round_counter, format!("{} declared", name));
        Ok(())
    }

    fn resolve_declare(&mut self, winner_hint: Option<&str>, is_valid: bool) -> Result<(), SessionError> {
        if self.requests.get(RequestKind::Declaration).is_none() {
            return Err(SessionError::NoPendingRequest(RequestKind::Declaration));
        }
        self.score_declaration(winner_hint, is_valid)
    }

    /// Scores the open declaration and ends the round. Validation happens
    /// before anything is written.
    fn score_declaration(&mut self, winner_hint: Option<&str>, is_valid: bool) -> Result<(), SessionError> {
        let cap = self.config.max_round_points;
        let wrong_show = self.config.wrong_show_penalty.min(cap);
        let round = self
            .round
            .as_ref()
            .ok_or(SessionError::NoPendingRequest(RequestKind::Declaration))?;
        let decl = round
            .declaration
            .as_ref()
            .ok_or(SessionError::NoPendingRequest(RequestKind::Declaration))?;
        let declarer = decl.player;
        let valid = is_valid && decl.evaluation.has_pure_sequence();

        let hand_points: Vec<Option<u32>> = round
            .players
            .iter()
            .enumerate()
            .map(|(i, p)| {
                (i != declarer && p.status == RummyPlayerStatus::Playing)
                    .then(|| evaluate_rummy_hand(&p.hand, round.wild_rank).penalty_points().min(cap))
            })
            .collect();

        let winner = if valid {
            declarer
        } else {
            let hinted = match winner_hint {
                Some(id) => {
                    let w = round.index_of(id).filter(|&w| {
                        w != declarer && round.players[w].status == RummyPlayerStatus::Playing
                    });
                    match w {
                        Some(w) => Some(w),
                        // A verdict of valid overruled for lacking a pure sequence
                        // names the declarer; credit the best remaining hand instead.
                        None if is_valid => None,
                        None => {
                            return Err(SessionError::InvalidTarget(format!(
                                "{} cannot win against a wrong show",
                                id
                            )))
                        }
                    }
                }
                None => None,
            };
            match hinted {
                Some(w) => w,
                None => hand_points
                    .iter()
                    .enumerate()
                    .filter_map(|(i, pts)| pts.map(|p| (p, i)))
                    .min()
                    .map(|(_, i)| i)
                    .ok_or_else(|| SessionError::illegal("no player left to credit"))?,
            }
        };

        let declarer_id = round.players[declarer].player_id.clone();
        let Some(round) = self.round.as_mut() else {
            return Ok(());
        };
        for (i, p) in round.players.iter_mut().enumerate() {
            if i == winner {
                p.points = Some(0);
            } else if i == declarer {
                p.points = Some(wrong_show);
            } else if let Some(points) = hand_points[i] {
                p.points = Some(points);
            }
        }
        self.requests.close(RequestKind::Declaration);
        let name = self.roster.name_of(&declarer_id);
        let message = if valid {
            format!("{} made a valid declaration", name)
        } else {
            format!("{} made a wrong show ({} points)", name, wrong_show)
        };
        self.log.push(self.round_counter, message);
        self.end_round_with(Some(winner), Some((declarer_id, valid)));
        Ok(())
    }

    fn cancel(&mut self, player_id: &str, kind: RequestKind) -> Result<(), SessionError> {
        let req = self
            .requests
            .get(kind)
            .ok_or(SessionError::NoPendingRequest(kind))?;
        if req.requester != player_id {
            return Err(SessionError::illegal(format!(
                "only {} can withdraw the {}",
                req.requester, kind
            )));
        }
        let Some(round) = self.round.as_mut() else {
            return Err(SessionError::NoPendingRequest(kind));
        };
        let Some(decl) = round.declaration.take() else {
            return Err(SessionError::NoPendingRequest(kind));
        };
        round.players[decl.player].hand.extend(decl.finish_card);
        round.drawn = decl.had_drawn;
        self.phase = if round.drop_phase_over() {
            RummyPhase::Play
        } else {
            RummyPhase::DropPhase
        };
        self.requests.close(kind);
        let name = self.roster.name_of(player_id);
        self.log
            .push(self.round_counter, format!("{} withdrew the declaration", name));
        Ok(())
    }

    /// A declaration left unresolved is settled by the hand's own merit.
    fn expire(&mut self, kind: RequestKind, request_id: u64) -> bool {
        let matches = self
            .requests
            .get(kind)
            .is_some_and(|r| r.id == request_id);
        if !matches {
            debug!(session_id = %self.id, %kind, request_id, "stale request timer ignored");
            return false;
        }
        let verdict = self
            .round
            .as_ref()
            .and_then(|r| r.declaration.as_ref())
            .is_some_and(|d| d.evaluation.is_complete());
        self.requests.expire(kind, request_id);
        self.log.push(
            self.round_counter,
            format!("Declaration timed out, ruled {}", if verdict { "valid" } else { "invalid" }),
        );
        info!(session_id = %self.id, %kind, request_id, verdict, "request expired");
        if let Err(e) = self.score_declaration(None, verdict) {
            warn!(session_id = %self.id, error = %e, "could not score expired declaration");
        }
        true
    }

    fn end_round(&mut self, winner: Option<usize>) {
        self.end_round_with(winner, None);
    }

    /// Copies round points to the roster, settles chips and checks the limit.
    fn end_round_with(&mut self, winner: Option<usize>, declaration: Option<(PlayerId, bool)>) {
        self.requests.clear();
        let Some(round) = self.round.as_ref() else {
            return;
        };
        let value = i64::from(self.config.point_value);
        let points: Vec<u32> = round.players.iter().map(|p| p.points.unwrap_or(0)).collect();
        let chips: Vec<i64> = match winner {
            Some(w) if value > 0 => {
                let pot: i64 = points
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| *i != w)
                    .map(|(_, p)| i64::from(*p) * value)
                    .sum();
                points
                    .iter()
                    .enumerate()
                    .map(|(i, p)| if i == w { pot } else { -i64::from(*p) * value })
                    .collect()
            }
            _ => vec![0; points.len()],
        };

        let mut results = Vec::with_capacity(round.players.len());
        let mut newly_eliminated = Vec::new();
        for (i, p) in round.players.iter().enumerate() {
            let Some(rp) = self.roster.get_mut(&p.player_id) else {
                continue;
            };
            rp.score += i64::from(points[i]);
            rp.balance += chips[i];
            if let SessionLimit::Points(target) = self.config.limit {
                if !rp.eliminated && rp.score > i64::from(target) {
                    rp.eliminated = true;
                    newly_eliminated.push(rp.name.clone());
                }
            }
            results.push(RummyPlayerResult {
                player_id: p.player_id.clone(),
                name: rp.name.clone(),
                status: p.status,
                points: points[i],
                chips: chips[i],
                total_score: rp.score,
                eliminated: rp.eliminated,
            });
        }
        let winner_id = winner.map(|w| round.players[w].player_id.clone());
        let wild_rank = round.wild_rank;

        let played = self.round_counter;
        self.round_counter += 1;
        self.phase = RummyPhase::Showdown;
        for name in newly_eliminated {
            self.log.push(played, format!("{} is eliminated", name));
        }
        match &winner_id {
            Some(id) => {
                let name = self.roster.name_of(id);
                self.log.push(played, format!("{} wins round {}", name, played))
            }
            None => self
                .log
                .push(played, format!("Round {} ends with no winner", played)),
        };
        let is_session_over = self.limit_reached();
        let leaderboard = self.leaderboard();
        info!(session_id = %self.id, round = played, winner = ?winner_id, "round complete");
        let (declarer_id, declaration_valid) = match declaration {
            Some((id, valid)) => (Some(id), Some(valid)),
            None => (None, None),
        };
        self.events.push(SessionEvent::RoundComplete {
            summary: RummyRoundSummary {
                session_id: self.id.clone(),
                round: played,
                winner_id,
                declarer_id,
                declaration_valid,
                wild_rank,
                results,
                leaderboard,
                is_session_over,
            },
        });
        if is_session_over {
            self.finish();
        }
    }

    /// Lowest cumulative score first, seat order on ties.
    pub fn leaderboard(&self) -> Vec<Standing> {
        let mut standings: Vec<Standing> =
            self.roster.players().iter().map(Standing::from).collect();
        standings.sort_by(|a, b| a.score.cmp(&b.score).then(a.seat.cmp(&b.seat)));
        standings
    }

    fn finish(&mut self) {
        self.active = false;
        self.phase = RummyPhase::Ended;
        let standings = self.leaderboard();
        let winner = standings.iter().find(|s| !s.eliminated).or(standings.first()).cloned();
        if let Some(w) = &winner {
            self.log.push(
                self.round_counter,
                format!("Session over, {} wins with {} points", w.name, w.score),
            );
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
        let state = PublicState::Rummy(self.public_state());
        self.events.push(SessionEvent::StateChange { state });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(players: usize) -> RummySession {
        let cfg = RummyConfig {
            limit: SessionLimit::Rounds(2),
            seed: Some(7),
            ..Default::default()
        };
        let mut s = RummySession::new("r", "table", cfg).unwrap();
        let roster = (1..=players)
            .map(|i| RosterPlayer::new(format!("p{}", i), format!("P{}", i)))
            .collect();
        s.set_players(roster).unwrap();
        s
    }

    fn drop(id: &str) -> RummyAction {
        RummyAction::DropPlayer { player_id: id.into() }
    }

    fn draw(id: &str, source: PileSource) -> RummyAction {
        RummyAction::DrawCard {
            player_id: id.into(),
            source,
        }
    }

    fn discard_first(s: &mut RummySession, id: &str) {
        let card = s.player_hand(id).unwrap().cards[0].code();
        s.handle_action(RummyAction::DiscardCard {
            player_id: id.into(),
            card,
        })
        .unwrap();
    }

    #[test]
    fn deal_gives_thirteen_cards_and_a_draw_pile() {
        let mut s = session(3);
        s.start_round().unwrap();
        assert_eq!(s.phase(), RummyPhase::DropPhase);
        for id in ["p1", "p2", "p3"] {
            assert_eq!(s.player_hand(id).unwrap().cards.len(), RUMMY_HAND_SIZE);
        }
        assert_eq!(s.draw_pile_len(), 54 - 3 * 13 - 1);
        assert!(s.discard_pile().is_empty());
        assert!(s.public_state().wild_rank.is_none());
    }

    #[test]
    fn drop_penalty_depends_on_the_players_own_draw() {
        let mut s = session(3);
        s.start_round().unwrap();
        s.handle_action(draw("p1", PileSource::DrawPile)).unwrap();
        discard_first(&mut s, "p1");
        assert_eq!(s.phase(), RummyPhase::DropPhase);

        // p2 has not drawn yet, so this is still a first drop
        s.handle_action(drop("p2")).unwrap();
        assert_eq!(s.phase(), RummyPhase::DropPhase);
        s.handle_action(draw("p3", PileSource::DrawPile)).unwrap();
        assert_eq!(s.phase(), RummyPhase::Play);
        discard_first(&mut s, "p3");
        s.handle_action(drop("p1")).unwrap();

        let events = s.drain_events();
        let summary = events
            .iter()
            .find_map(|e| match e {
                SessionEvent::RoundComplete { summary } => Some(summary.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(summary.winner_id.as_deref(), Some("p3"));
        let scores: Vec<i64> = s.roster().iter().map(|p| p.score).collect();
        assert_eq!(scores, vec![40, 20, 0]);
        assert!(!summary.is_session_over);
    }

    #[test]
    fn starting_seat_rotates_each_round() {
        let mut s = session(2);
        s.start_round().unwrap();
        s.handle_action(drop("p1")).unwrap();
        assert_eq!(s.phase(), RummyPhase::Showdown);
        s.start_round().unwrap();
        assert_eq!(s.current_player(), Some("p2"));
    }

    #[test]
    fn discard_needs_a_draw_first() {
        let mut s = session(2);
        s.start_round().unwrap();
        let card = s.player_hand("p1").unwrap().cards[0].code();
        let err = s
            .handle_action(RummyAction::DiscardCard {
                player_id: "p1".into(),
                card,
            })
            .unwrap_err();
        assert!(matches!(err, SessionError::IllegalAction(_)));
    }

    #[test]
    fn one_draw_per_turn() {
        let mut s = session(2);
        s.start_round().unwrap();
        s.handle_action(draw("p1", PileSource::DrawPile)).unwrap();
        assert!(s.handle_action(draw("p1", PileSource::DrawPile)).is_err());
        assert_eq!(s.player_hand("p1").unwrap().cards.len(), RUMMY_HAND_SIZE + 1);
    }

    #[test]
    fn unknown_card_code_is_not_in_hand() {
        let mut s = session(2);
        s.start_round().unwrap();
        s.handle_action(draw("p1", PileSource::DrawPile)).unwrap();
        let err = s
            .handle_action(RummyAction::DiscardCard {
                player_id: "p1".into(),
                card: "ZZ".into(),
            })
            .unwrap_err();
        assert_eq!(err, SessionError::CardNotInHand("ZZ".into()));
    }

    #[test]
    fn session_over_rejects_new_round() {
        let cfg = RummyConfig {
            limit: SessionLimit::Rounds(1),
            seed: Some(3),
            ..Default::default()
        };
        let mut s = RummySession::new("r", "one", cfg).unwrap();
        s.set_players(vec![RosterPlayer::new("a", "A"), RosterPlayer::new("b", "B")])
            .unwrap();
        s.start_round().unwrap();
        s.handle_action(drop("a")).unwrap();
        assert!(s.is_session_over());
        assert_eq!(s.phase(), RummyPhase::Ended);
        assert_eq!(s.start_round().unwrap_err(), SessionError::SessionComplete);
        let ended = s
            .drain_events()
            .into_iter()
            .filter(SessionEvent::is_terminal)
            .count();
        assert_eq!(ended, 1);
    }
}
