//! Seeded random-policy self-play for both game families.
//!
//! The driver acts as both the players and the host: it prepares every deck
//! itself so that it knows the hands, drives each session through its
//! public action path, resolves showdowns and declarations by evaluating the
//! hands, and forwards every emitted event to a sink.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Write;

use cardtable_engine::cards::{full_deck, Card, Rank};
use cardtable_engine::config::{RummyConfig, SessionLimit, TeenPattiConfig};
use cardtable_engine::deck::Deck;
use cardtable_engine::events::FinalSummary;
use cardtable_engine::hand::{compare_cards, evaluate_hand};
use cardtable_engine::meld::{
    build_deck, evaluate_rummy_hand, wild_rank_for, RummyCard, RummyEvaluation, RUMMY_HAND_SIZE,
};
use cardtable_engine::player::RosterPlayer;
use cardtable_engine::rummy::{PileSource, RummyAction, RummyPhase, RummySession};
use cardtable_engine::teen_patti::{
    PlayerStatus, TeenPattiAction, TeenPattiPhase, TeenPattiSession, TEEN_PATTI_HAND_SIZE,
};
use cardtable_engine::timers::RequestKind;
use cardtable_engine::{SessionError, SessionEvent};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

use crate::error::CliError;

/// Actions a betting hand may take before the player to act folds.
const MAX_HAND_ACTIONS: usize = 120;
/// Turns a meld round may take before the player to act drops.
const MAX_ROUND_TURNS: usize = 150;

/// What one simulated session produced.
#[derive(Debug, Clone)]
pub struct SimOutcome {
    pub session_id: String,
    pub rounds: u32,
    pub events: usize,
    pub summary: Option<FinalSummary>,
}

/// `P1`..`Pn`, all named so every seat is dealt in.
pub fn table(players: usize) -> Vec<RosterPlayer> {
    (1..=players)
        .map(|i| RosterPlayer::new(format!("P{}", i), format!("Player {}", i)))
        .collect()
}

/// Splits a prepared betting deck the way the session deals it: one card at
/// a time round-robin in roster order.
pub fn teen_patti_hands(deck: &[Card], players: usize) -> Vec<Vec<Card>> {
    (0..players)
        .map(|i| {
            (0..TEEN_PATTI_HAND_SIZE)
                .filter_map(|k| deck.get(i + k * players).copied())
                .collect()
        })
        .collect()
}

/// Hands, closed joker and draw pile of a prepared meld deck.
pub fn rummy_hands(deck: &[RummyCard], players: usize) -> (Vec<Vec<RummyCard>>, Option<RummyCard>) {
    let hands = (0..players)
        .map(|i| {
            (0..RUMMY_HAND_SIZE)
                .filter_map(|k| deck.get(i + k * players).copied())
                .collect()
        })
        .collect();
    (hands, deck.get(players * RUMMY_HAND_SIZE).copied())
}

/// Serializes every queued event as one JSON line.
fn flush(events: Vec<SessionEvent>, sink: &mut dyn Write, outcome: &mut SimOutcome) -> Result<(), CliError> {
    for event in events {
        if let SessionEvent::SessionEnded { summary } = &event {
            outcome.summary = Some(summary.clone());
        }
        writeln!(sink, "{}", serde_json::to_string(&event)?)?;
        outcome.events += 1;
    }
    Ok(())
}

pub struct TeenPattiSelfPlay {
    rng: ChaCha20Rng,
    session: TeenPattiSession,
    hands: HashMap<String, Vec<Card>>,
}

impl TeenPattiSelfPlay {
    pub fn new(id: &str, players: usize, rounds: u32, seed: u64) -> Result<Self, CliError> {
        let config = TeenPattiConfig {
            round_limit: rounds,
            seed: Some(seed),
            ..TeenPattiConfig::default()
        };
        let mut session = TeenPattiSession::new(id, format!("sim {}", id), config)?;
        session.set_players(table(players))?;
        Ok(Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            session,
            hands: HashMap::new(),
        })
    }

    pub fn run(mut self, sink: &mut dyn Write) -> Result<SimOutcome, CliError> {
        let mut outcome = SimOutcome {
            session_id: self.session.id().to_string(),
            rounds: 0,
            events: 0,
            summary: None,
        };
        loop {
            let deck = Deck::shuffled(full_deck(), &mut self.rng).into_remaining();
            let ids: Vec<String> = self.session.roster().iter().map(|p| p.id.clone()).collect();
            match self.session.start_round_with_deck(deck.clone()) {
                Ok(()) => {}
                Err(SessionError::SessionComplete) => break,
                Err(e) => return Err(e.into()),
            }
            self.hands = ids
                .into_iter()
                .zip(teen_patti_hands(&deck, self.session.roster().len()))
                .collect();
            outcome.rounds += 1;
            flush(self.session.drain_events(), sink, &mut outcome)?;
            self.play_hand(sink, &mut outcome)?;
        }
        flush(self.session.drain_events(), sink, &mut outcome)?;
        Ok(outcome)
    }

    fn play_hand(&mut self, sink: &mut dyn Write, outcome: &mut SimOutcome) -> Result<(), CliError> {
        let mut actions = 0;
        while self.session.phase() == TeenPattiPhase::Active {
            let Some(player_id) = self.session.current_player().map(str::to_string) else {
                break;
            };
            actions += 1;
            let fold = TeenPattiAction::Fold {
                player_id: player_id.clone(),
            };
            let action = if actions > MAX_HAND_ACTIONS {
                fold.clone()
            } else {
                self.choose(&player_id)
            };
            if self.session.handle_action(action).is_err() {
                self.session.handle_action(fold)?;
            }
            self.resolve_requests()?;
            flush(self.session.drain_events(), sink, outcome)?;
        }
        Ok(())
    }

    fn choose(&mut self, player_id: &str) -> TeenPattiAction {
        let state = self.session.public_state();
        let live: Vec<_> = state
            .players
            .iter()
            .filter(|p| p.in_round && !p.folded)
            .collect();
        let seen = live
            .iter()
            .find(|p| p.player_id == player_id)
            .is_some_and(|p| p.status == Some(PlayerStatus::Seen));
        let others = |status: PlayerStatus| -> Vec<String> {
            live.iter()
                .filter(|p| p.player_id != player_id && p.status == Some(status))
                .map(|p| p.player_id.clone())
                .collect()
        };
        let blind_left = live
            .iter()
            .filter(|p| p.status == Some(PlayerStatus::Blind))
            .count();
        let player_id = player_id.to_string();

        if !seen && self.rng.random_bool(0.35) {
            return TeenPattiAction::Seen { player_id };
        }
        if live.len() == 2 && self.rng.random_bool(0.3) {
            return TeenPattiAction::Show { player_id };
        }
        if seen {
            let seen_others = others(PlayerStatus::Seen);
            if !seen_others.is_empty() && self.rng.random_bool(0.15) {
                let target_id = seen_others[self.rng.random_range(0..seen_others.len())].clone();
                return TeenPattiAction::SideShowRequest {
                    player_id,
                    target_id,
                };
            }
            let blind_others = others(PlayerStatus::Blind);
            if !blind_others.is_empty() && blind_left <= 2 && self.rng.random_bool(0.05) {
                let target_id = blind_others[self.rng.random_range(0..blind_others.len())].clone();
                return TeenPattiAction::ForceShow {
                    player_id,
                    target_id,
                };
            }
        }
        if self.rng.random_bool(0.1) {
            return TeenPattiAction::Fold { player_id };
        }
        TeenPattiAction::Bet {
            player_id,
            amount: None,
            double: self.rng.random_bool(0.2),
        }
    }

    /// The requester wins only with the strictly better hand.
    fn requester_wins(&self, requester: &str, target: &str) -> bool {
        match (self.hands.get(requester), self.hands.get(target)) {
            (Some(a), Some(b)) => compare_cards(a, b) == Ordering::Greater,
            _ => false,
        }
    }

    fn resolve_requests(&mut self) -> Result<(), CliError> {
        for kind in [RequestKind::SideShow, RequestKind::Show, RequestKind::ForceShow] {
            let Some(req) = self.session.pending_request(kind).cloned() else {
                continue;
            };
            let target = req.target.clone().unwrap_or_default();
            let winner_id = if self.requester_wins(&req.requester, &target) {
                req.requester
            } else {
                target
            };
            let action = match kind {
                RequestKind::SideShow => TeenPattiAction::SideShowResolve { winner_id },
                _ => TeenPattiAction::ShowResolve { winner_id },
            };
            self.session.handle_action(action)?;
        }
        Ok(())
    }
}

pub struct RummySelfPlay {
    rng: ChaCha20Rng,
    session: RummySession,
    wild: Rank,
}

impl RummySelfPlay {
    pub fn new(id: &str, players: usize, rounds: u32, seed: u64) -> Result<Self, CliError> {
        let config = RummyConfig {
            limit: SessionLimit::Rounds(rounds),
            point_value: 1,
            seed: Some(seed),
            ..RummyConfig::default()
        };
        let mut session = RummySession::new(id, format!("sim {}", id), config)?;
        session.set_players(table(players))?;
        Ok(Self {
            rng: ChaCha20Rng::seed_from_u64(seed),
            session,
            wild: Rank::Ace,
        })
    }

    pub fn run(mut self, sink: &mut dyn Write) -> Result<SimOutcome, CliError> {
        let mut outcome = SimOutcome {
            session_id: self.session.id().to_string(),
            rounds: 0,
            events: 0,
            summary: None,
        };
        loop {
            let printed = self.session.config().printed_jokers;
            let deck = Deck::shuffled(build_deck(printed), &mut self.rng).into_remaining();
            let dealt = self
                .session
                .roster()
                .iter()
                .filter(|p| p.is_named() && !p.eliminated)
                .count();
            match self.session.start_round_with_deck(deck.clone()) {
                Ok(()) => {}
                Err(SessionError::SessionComplete) => break,
                Err(e) => return Err(e.into()),
            }
            if let Some(cut) = deck.get(dealt * RUMMY_HAND_SIZE) {
                self.wild = wild_rank_for(*cut);
            }
            outcome.rounds += 1;
            flush(self.session.drain_events(), sink, &mut outcome)?;
            self.play_round(sink, &mut outcome)?;
        }
        flush(self.session.drain_events(), sink, &mut outcome)?;
        Ok(outcome)
    }

    fn play_round(&mut self, sink: &mut dyn Write, outcome: &mut SimOutcome) -> Result<(), CliError> {
        let mut turns = 0;
        while matches!(self.session.phase(), RummyPhase::DropPhase | RummyPhase::Play) {
            let Some(player_id) = self.session.current_player().map(str::to_string) else {
                break;
            };
            turns += 1;
            self.take_turn(&player_id, turns > MAX_ROUND_TURNS)?;
            flush(self.session.drain_events(), sink, outcome)?;
        }
        Ok(())
    }

    fn take_turn(&mut self, player_id: &str, out_of_turns: bool) -> Result<(), CliError> {
        let drop = RummyAction::DropPlayer {
            player_id: player_id.to_string(),
        };
        let early = self.session.phase() == RummyPhase::DropPhase;
        if out_of_turns || (early && self.rng.random_bool(0.08)) {
            self.session.handle_action(drop)?;
            return Ok(());
        }

        let view = self.session.player_hand(player_id)?;
        if view.wild_rank.is_none()
            && evaluate_rummy_hand(&view.cards, self.wild).has_pure_sequence()
            && self.rng.random_bool(0.5)
        {
            self.session.handle_action(RummyAction::ShowClosedJoker {
                player_id: player_id.to_string(),
            })?;
        }

        let source = if !self.session.discard_pile().is_empty() && self.rng.random_bool(0.25) {
            PileSource::DiscardPile
        } else {
            PileSource::DrawPile
        };
        match self.session.handle_action(RummyAction::DrawCard {
            player_id: player_id.to_string(),
            source,
        }) {
            Ok(()) => {}
            Err(SessionError::PilesExhausted) => {
                self.session.handle_action(drop)?;
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }

        let hand = self.session.player_hand(player_id)?.cards;
        let Some((pos, evaluation)) = best_discard(&hand, self.wild) else {
            return Err(CliError::InvalidInput(format!(
                "{} holds {} cards after drawing",
                player_id,
                hand.len()
            )));
        };
        let card = hand[pos].code();
        if evaluation.is_complete() {
            self.session.handle_action(RummyAction::DeclareRummy {
                player_id: player_id.to_string(),
                finish_card: Some(card),
            })?;
            self.session.handle_action(RummyAction::ResolveDeclare {
                winner_id: None,
                is_valid: true,
            })?;
        } else {
            self.session.handle_action(RummyAction::DiscardCard {
                player_id: player_id.to_string(),
                card,
            })?;
        }
        Ok(())
    }
}

/// Card whose removal leaves the least deadwood, with the evaluation of the
/// 13 cards kept. Ties go to the higher-point card.
pub fn best_discard(hand: &[RummyCard], wild: Rank) -> Option<(usize, RummyEvaluation)> {
    if hand.len() != RUMMY_HAND_SIZE + 1 {
        return None;
    }
    (0..hand.len())
        .map(|i| {
            let mut kept = hand.to_vec();
            kept.remove(i);
            (i, evaluate_rummy_hand(&kept, wild))
        })
        .min_by(|(i, a), (j, b)| {
            (!a.is_complete())
                .cmp(&!b.is_complete())
                .then(a.penalty_points().cmp(&b.penalty_points()))
                .then(hand[*j].points(wild).cmp(&hand[*i].points(wild)))
        })
}

/// Label of a betting hand, e.g. `"pair"`.
pub fn teen_patti_label(cards: &[Card]) -> &'static str {
    evaluate_hand(cards).label()
}
