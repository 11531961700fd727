use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// RNG owned by each session. Seeded sessions replay identically.
pub type SessionRng = ChaCha20Rng;

pub fn session_rng(seed: Option<u64>) -> SessionRng {
    ChaCha20Rng::seed_from_u64(seed.unwrap_or_else(rand::random))
}

/// Fisher–Yates shuffle, walking from the last index down.
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    for i in (1..items.len()).rev() {
        let j = rng.random_range(0..=i);
        items.swap(i, j);
    }
}

/// An ordered run of cards consumed front-to-back.
/// A card is handed out at most once between two resets, so hands dealt
/// from the same deck are always disjoint.
///
/// # Examples
///
/// ```
/// use cardtable_engine::cards::full_deck;
/// use cardtable_engine::deck::{session_rng, Deck};
///
/// let mut rng = session_rng(Some(42));
/// let mut deck = Deck::shuffled(full_deck(), &mut rng);
/// let hand = deck.deal_n(3);
/// assert_eq!(hand.len(), 3);
/// assert_eq!(deck.remaining(), 49);
/// ```
#[derive(Debug, Clone)]
pub struct Deck<C> {
    cards: Vec<C>,
    position: usize,
}

impl<C: Copy> Deck<C> {
    /// Keeps the given order; used for replays and prepared decks.
    pub fn new(cards: Vec<C>) -> Self {
        Self { cards, position: 0 }
    }

    pub fn shuffled<R: Rng + ?Sized>(mut cards: Vec<C>, rng: &mut R) -> Self {
        shuffle(&mut cards, rng);
        Self::new(cards)
    }

    pub fn deal_card(&mut self) -> Option<C> {
        let c = self.cards.get(self.position).copied()?;
        self.position += 1;
        Some(c)
    }

    pub fn deal_n(&mut self, n: usize) -> Vec<C> {
        (0..n).filter_map(|_| self.deal_card()).collect()
    }

    pub fn remaining(&self) -> usize {
        self.cards.len().saturating_sub(self.position)
    }

    /// Consumes the deck, returning the undealt cards in deal order.
    pub fn into_remaining(mut self) -> Vec<C> {
        self.cards.split_off(self.position)
    }
}
