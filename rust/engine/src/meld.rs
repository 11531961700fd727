//! Rummy cards, deck composition and meld search.
//!
//! A hand is scored by the arrangement into pure sequences, sequences and
//! sets that leaves the least deadwood. Arrangements holding a pure sequence
//! always beat arrangements without one.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cards::{full_deck, Card, ParseCardError, Rank, Suit};

pub const RUMMY_HAND_SIZE: usize = 13;

/// A card in the meld game: either a standard card or a printed joker.
/// Printed jokers carry a synthetic id so that two of them stay distinct.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RummyCard {
    Standard(Card),
    PrintedJoker { id: u8 },
}

impl RummyCard {
    pub fn code(&self) -> String {
        self.to_string()
    }

    /// True for printed jokers and for every card of the wild rank.
    pub fn is_joker(&self, wild: Rank) -> bool {
        match self {
            RummyCard::PrintedJoker { .. } => true,
            RummyCard::Standard(c) => c.rank == wild,
        }
    }

    pub fn points(&self, wild: Rank) -> u32 {
        match self {
            RummyCard::PrintedJoker { .. } => 0,
            RummyCard::Standard(c) if c.rank == wild => 0,
            RummyCard::Standard(c) => face_points(c.rank),
        }
    }

    pub fn standard(&self) -> Option<Card> {
        match self {
            RummyCard::Standard(c) => Some(*c),
            RummyCard::PrintedJoker { .. } => None,
        }
    }
}

impl From<Card> for RummyCard {
    fn from(card: Card) -> Self {
        RummyCard::Standard(card)
    }
}

impl fmt::Display for RummyCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RummyCard::Standard(c) => write!(f, "{}", c),
            RummyCard::PrintedJoker { id } => write!(f, "JK{}", id),
        }
    }
}

impl FromStr for RummyCard {
    type Err = ParseCardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        if let Some(id) = t.strip_prefix("JK").or_else(|| t.strip_prefix("jk")) {
            return id
                .parse::<u8>()
                .map(|id| RummyCard::PrintedJoker { id })
                .map_err(|_| ParseCardError(s.to_string()));
        }
        t.parse::<Card>().map(RummyCard::Standard)
    }
}

fn face_points(rank: Rank) -> u32 {
    match rank {
        Rank::Ace | Rank::King | Rank::Queen | Rank::Jack | Rank::Ten => 10,
        r => u32::from(r.value()),
    }
}

/// 52 standard cards followed by `printed_jokers` jokers numbered from 1.
pub fn build_deck(printed_jokers: u8) -> Vec<RummyCard> {
    let mut deck: Vec<RummyCard> = full_deck().into_iter().map(RummyCard::Standard).collect();
    deck.extend((1..=printed_jokers).map(|id| RummyCard::PrintedJoker { id }));
    deck
}

/// Wild rank designated by the cut card. A printed joker makes Aces wild.
pub fn wild_rank_for(cut: RummyCard) -> Rank {
    match cut {
        RummyCard::Standard(c) => c.rank,
        RummyCard::PrintedJoker { .. } => Rank::Ace,
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeldKind {
    /// Three or more consecutive cards of one suit, no joker standing in.
    PureSequence,
    /// A run of one suit completed with at least one joker.
    Sequence,
    /// Three or four cards of one rank in different suits.
    Set,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meld {
    pub kind: MeldKind,
    pub cards: Vec<RummyCard>,
}

/// Best arrangement found for a hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RummyEvaluation {
    pub wild_rank: Rank,
    pub melds: Vec<Meld>,
    /// Unmatched cards, spare jokers included at zero points.
    pub deadwood: Vec<RummyCard>,
    pub deadwood_points: u32,
    /// Point value of the whole hand, ignoring melds.
    pub total_points: u32,
}

impl RummyEvaluation {
    pub fn has_pure_sequence(&self) -> bool {
        self.melds.iter().any(|m| m.kind == MeldKind::PureSequence)
    }

    /// Every card melded and at least one pure sequence present.
    pub fn is_complete(&self) -> bool {
        self.has_pure_sequence() && self.deadwood_points == 0
    }

    /// Points charged when the round ends against this hand. Without a pure
    /// sequence none of the melds count.
    pub fn penalty_points(&self) -> u32 {
        if self.has_pure_sequence() {
            self.deadwood_points
        } else {
            self.total_points
        }
    }
}

/// Finds the arrangement with the least deadwood, preferring any
/// arrangement that contains a pure sequence.
///
/// # Panics
///
/// Panics on a hand that is not 13 or 14 cards long, or that repeats a card.
pub fn evaluate_rummy_hand(cards: &[RummyCard], wild: Rank) -> RummyEvaluation {
    assert!(
        cards.len() == RUMMY_HAND_SIZE || cards.len() == RUMMY_HAND_SIZE + 1,
        "a rummy hand holds 13 or 14 cards, got {}",
        cards.len()
    );
    let mut seen = HashSet::with_capacity(cards.len());
    for c in cards {
        assert!(seen.insert(*c), "duplicate card in hand: {}", c);
    }

    let printed: Vec<RummyCard> = cards
        .iter()
        .copied()
        .filter(|c| matches!(c, RummyCard::PrintedJoker { .. }))
        .collect();
    let mut wild_cards: Vec<Card> = Vec::new();
    let mut plain: Vec<Card> = Vec::new();
    for c in cards.iter().filter_map(RummyCard::standard) {
        if c.rank == wild {
            wild_cards.push(c);
        } else {
            plain.push(c);
        }
    }

    // Each wild-rank card may play as itself or as a joker.
    let mut best: Option<(Vec<Card>, Vec<RummyCard>, Arrangement)> = None;
    for as_natural in 0u32..(1 << wild_cards.len()) {
        let mut naturals = plain.clone();
        let mut jokers = printed.clone();
        for (i, c) in wild_cards.iter().enumerate() {
            if as_natural & (1 << i) != 0 {
                naturals.push(*c);
            } else {
                jokers.push(RummyCard::Standard(*c));
            }
        }
        naturals.sort_unstable_by_key(|c| (c.suit, c.rank));

        let search = MeldSearch::new(&naturals, jokers.len() as u8, wild);
        let found = search.run();
        let better = match &best {
            None => true,
            Some((_, _, current)) => found.key() < current.key(),
        };
        if better {
            best = Some((naturals, jokers, found));
        }
    }

    let total_points = cards.iter().map(|c| c.points(wild)).sum();
    let (naturals, jokers, arrangement) = match best {
        Some(b) => b,
        None => unreachable!("at least one partition is always searched"),
    };

    let mut spare_jokers = jokers.into_iter();
    let mut covered = 0u16;
    let mut melds = Vec::with_capacity(arrangement.melds.len());
    for cand in &arrangement.melds {
        covered |= cand.mask;
        let mut meld_cards: Vec<RummyCard> = (0..naturals.len())
            .filter(|&i| cand.mask & (1 << i) != 0)
            .map(|i| RummyCard::Standard(naturals[i]))
            .collect();
        meld_cards.extend(spare_jokers.by_ref().take(cand.jokers as usize));
        melds.push(Meld {
            kind: cand.kind,
            cards: meld_cards,
        });
    }
    let mut deadwood: Vec<RummyCard> = (0..naturals.len())
        .filter(|&i| covered & (1 << i) == 0)
        .map(|i| RummyCard::Standard(naturals[i]))
        .collect();
    deadwood.extend(spare_jokers);

    RummyEvaluation {
        wild_rank: wild,
        melds,
        deadwood,
        deadwood_points: arrangement.deadwood_points,
        total_points,
    }
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    mask: u16,
    jokers: u8,
    kind: MeldKind,
}

#[derive(Debug, Clone, Default)]
struct Arrangement {
    melds: Vec<Candidate>,
    deadwood_points: u32,
}

impl Arrangement {
    fn has_pure_sequence(&self) -> bool {
        self.melds.iter().any(|m| m.kind == MeldKind::PureSequence)
    }

    fn jokers_used(&self) -> u32 {
        self.melds.iter().map(|m| u32::from(m.jokers)).sum()
    }

    // smaller is better
    fn key(&self) -> (bool, u32, u32) {
        (
            !self.has_pure_sequence(),
            self.deadwood_points,
            self.jokers_used(),
        )
    }
}

struct MeldSearch {
    points: Vec<u32>,
    jokers: u8,
    // candidates indexed by their lowest card
    by_low: Vec<Vec<Candidate>>,
}

impl MeldSearch {
    fn new(naturals: &[Card], jokers: u8, wild: Rank) -> Self {
        let n = naturals.len();
        let points = naturals
            .iter()
            .map(|c| RummyCard::Standard(*c).points(wild))
            .collect();

        let mut candidates = Vec::new();
        let mut seen = HashSet::new();
        push_runs(naturals, jokers, &mut candidates, &mut seen);
        push_sets(naturals, jokers, &mut candidates, &mut seen);

        let mut by_low = vec![Vec::new(); n];
        for cand in candidates {
            let low = cand.mask.trailing_zeros() as usize;
            by_low[low].push(cand);
        }
        Self {
            points,
            jokers,
            by_low,
        }
    }

    fn run(&self) -> Arrangement {
        let mut best = Arrangement {
            melds: Vec::new(),
            deadwood_points: self.points.iter().sum(),
        };
        let mut chosen = Vec::new();
        self.dfs(0, 0, self.jokers, &mut chosen, &mut best);
        best
    }

    fn dfs(
        &self,
        covered: u16,
        deadwood_points: u32,
        jokers_left: u8,
        chosen: &mut Vec<Candidate>,
        best: &mut Arrangement,
    ) {
        if best.has_pure_sequence() && deadwood_points > best.deadwood_points {
            return;
        }
        let next = (0..self.points.len()).find(|&i| covered & (1 << i) == 0);
        let Some(i) = next else {
            let candidate = Arrangement {
                melds: chosen.clone(),
                deadwood_points,
            };
            if candidate.key() < best.key() {
                *best = candidate;
            }
            return;
        };

        for cand in &self.by_low[i] {
            if cand.mask & covered == 0 && cand.jokers <= jokers_left {
                chosen.push(*cand);
                self.dfs(
                    covered | cand.mask,
                    deadwood_points,
                    jokers_left - cand.jokers,
                    chosen,
                    best,
                );
                chosen.pop();
            }
        }
        self.dfs(
            covered | (1 << i),
            deadwood_points + self.points[i],
            jokers_left,
            chosen,
            best,
        );
    }
}

fn suit_index(s: Suit) -> usize {
    match s {
        Suit::Clubs => 0,
        Suit::Diamonds => 1,
        Suit::Hearts => 2,
        Suit::Spades => 3,
    }
}

fn push_runs(
    naturals: &[Card],
    jokers: u8,
    out: &mut Vec<Candidate>,
    seen: &mut HashSet<(u16, u8)>,
) {
    // slot[suit][value]; the Ace sits at both 1 and 14
    let mut slot = [[None::<usize>; 15]; 4];
    for (i, c) in naturals.iter().enumerate() {
        let s = suit_index(c.suit);
        let v = c.rank.value() as usize;
        slot[s][v] = Some(i);
        if c.rank == Rank::Ace {
            slot[s][1] = Some(i);
        }
    }

    for suit_slots in &slot {
        for start in 1..=12usize {
            for len in 3..=13usize {
                let end = start + len - 1;
                if end > 14 {
                    break;
                }
                let window = &suit_slots[start..=end];
                // a joker on either end only ever pads a run up to three cards
                if len > 3 && (window[0].is_none() || window[len - 1].is_none()) {
                    continue;
                }
                let missing = window.iter().filter(|s| s.is_none()).count();
                if missing > jokers as usize {
                    continue;
                }
                let present: Vec<(usize, usize)> = window
                    .iter()
                    .enumerate()
                    .filter_map(|(pos, s)| s.map(|i| (pos, i)))
                    .collect();
                let mut picks = Vec::with_capacity(present.len());
                choose_run_cards(
                    &present,
                    0,
                    len,
                    missing as u8,
                    jokers,
                    &mut picks,
                    out,
                    seen,
                );
            }
        }
    }
}

// Each present card either plays as itself or is swapped for a joker so the
// card stays free for another meld.
#[allow(clippy::too_many_arguments)]
fn choose_run_cards(
    present: &[(usize, usize)],
    at: usize,
    len: usize,
    jokers_used: u8,
    jokers: u8,
    picks: &mut Vec<usize>,
    out: &mut Vec<Candidate>,
    seen: &mut HashSet<(u16, u8)>,
) {
    if jokers_used > jokers {
        return;
    }
    if at == present.len() {
        if picks.is_empty() {
            return;
        }
        let mask = picks.iter().fold(0u16, |m, &i| m | (1 << i));
        if seen.insert((mask, jokers_used)) {
            let kind = if jokers_used == 0 {
                MeldKind::PureSequence
            } else {
                MeldKind::Sequence
            };
            out.push(Candidate {
                mask,
                jokers: jokers_used,
                kind,
            });
        }
        return;
    }
    let (pos, idx) = present[at];
    picks.push(idx);
    choose_run_cards(present, at + 1, len, jokers_used, jokers, picks, out, seen);
    picks.pop();
    let is_end = pos == 0 || pos == len - 1;
    if len == 3 || !is_end {
        choose_run_cards(
            present,
            at + 1,
            len,
            jokers_used + 1,
            jokers,
            picks,
            out,
            seen,
        );
    }
}

fn push_sets(
    naturals: &[Card],
    jokers: u8,
    out: &mut Vec<Candidate>,
    seen: &mut HashSet<(u16, u8)>,
) {
    let mut by_rank: [Vec<usize>; 15] = Default::default();
    for (i, c) in naturals.iter().enumerate() {
        by_rank[c.rank.value() as usize].push(i);
    }
    for group in by_rank.iter().filter(|g| !g.is_empty()) {
        for subset in 1u32..(1 << group.len()) {
            let k = subset.count_ones() as u8;
            // jokers only ever fill a set up to three cards
            let needed = 3u8.saturating_sub(k);
            if needed > jokers {
                continue;
            }
            let mask = group
                .iter()
                .enumerate()
                .filter(|(bit, _)| subset & (1u32 << *bit) != 0)
                .fold(0u16, |m, (_, &i)| m | (1 << i));
            if seen.insert((mask, needed)) {
                out.push(Candidate {
                    mask,
                    jokers: needed,
                    kind: MeldKind::Set,
                });
            }
        }
    }
}
