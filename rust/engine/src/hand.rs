//! Three-card hand ranking for the betting game.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::cards::{Card, Rank};

/// Category ladder, weakest first: high card < pair < color < sequence <
/// pure sequence < trail.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    HighCard = 0,
    Pair = 1,
    /// Three cards of one suit.
    Color = 2,
    /// Three consecutive ranks, mixed suits.
    Sequence = 3,
    /// Three consecutive ranks of one suit.
    PureSequence = 4,
    /// Three of a kind.
    Trail = 5,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Category::HighCard => "high card",
            Category::Pair => "pair",
            Category::Color => "color",
            Category::Sequence => "sequence",
            Category::PureSequence => "pure sequence",
            Category::Trail => "trail",
        }
    }
}

/// Totally ordered strength of a three-card hand. Ordering compares the
/// category first, then the tie-break vector.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct HandStrength {
    pub category: Category,
    // tie-break values, most significant first
    pub kickers: [u8; 3],
}

impl HandStrength {
    pub fn label(&self) -> &'static str {
        self.category.label()
    }
}

// A-K-Q tops every run, A-2-3 comes second, then K-Q-J downwards.
const ACE_HIGH_RUN: u8 = 16;
const ACE_LOW_RUN: u8 = 15;

/// Ranks a three-card hand.
///
/// # Panics
///
/// Panics when `cards` does not hold exactly three distinct cards. That is an
/// integration bug, not a game-rule violation.
///
/// # Examples
///
/// ```
/// use cardtable_engine::cards::{Card, Rank, Suit};
/// use cardtable_engine::hand::{evaluate_hand, Category};
///
/// let trail = [
///     Card::new(Rank::Seven, Suit::Clubs),
///     Card::new(Rank::Seven, Suit::Hearts),
///     Card::new(Rank::Seven, Suit::Spades),
/// ];
/// assert_eq!(evaluate_hand(&trail).category, Category::Trail);
/// ```
pub fn evaluate_hand(cards: &[Card]) -> HandStrength {
    assert_eq!(
        cards.len(),
        3,
        "a teen patti hand holds exactly 3 cards, got {}",
        cards.len()
    );
    assert!(
        cards[0] != cards[1] && cards[1] != cards[2] && cards[0] != cards[2],
        "duplicate card in hand: {:?}",
        cards
    );

    let mut ranks = [
        rank_val(cards[0].rank),
        rank_val(cards[1].rank),
        rank_val(cards[2].rank),
    ];
    ranks.sort_unstable_by(|a, b| b.cmp(a));

    let same_suit = cards[0].suit == cards[1].suit && cards[1].suit == cards[2].suit;

    if ranks[0] == ranks[2] {
        return HandStrength {
            category: Category::Trail,
            kickers: [ranks[0], 0, 0],
        };
    }

    if let Some(high) = run_value(ranks) {
        let category = if same_suit {
            Category::PureSequence
        } else {
            Category::Sequence
        };
        return HandStrength {
            category,
            kickers: [high, 0, 0],
        };
    }

    if same_suit {
        return HandStrength {
            category: Category::Color,
            kickers: ranks,
        };
    }

    if ranks[0] == ranks[1] || ranks[1] == ranks[2] {
        let (pair, kicker) = if ranks[0] == ranks[1] {
            (ranks[0], ranks[2])
        } else {
            (ranks[1], ranks[0])
        };
        return HandStrength {
            category: Category::Pair,
            kickers: [pair, kicker, 0],
        };
    }

    HandStrength {
        category: Category::HighCard,
        kickers: ranks,
    }
}

pub fn compare_hands(a: &HandStrength, b: &HandStrength) -> Ordering {
    match a.category.cmp(&b.category) {
        Ordering::Equal => a.kickers.cmp(&b.kickers),
        ord => ord,
    }
}

/// Convenience wrapper: evaluates both hands and compares them.
pub fn compare_cards(a: &[Card], b: &[Card]) -> Ordering {
    compare_hands(&evaluate_hand(a), &evaluate_hand(b))
}

fn rank_val(r: Rank) -> u8 {
    r as u8
}

fn run_value(desc: [u8; 3]) -> Option<u8> {
    match desc {
        [14, 13, 12] => Some(ACE_HIGH_RUN),
        [14, 3, 2] => Some(ACE_LOW_RUN),
        [a, b, c] if a == b + 1 && b == c + 1 => Some(a),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cards::Suit;

    fn hand(codes: [&str; 3]) -> [Card; 3] {
        codes.map(|c| c.parse().unwrap())
    }

    #[test]
    fn classifies_every_category() {
        let cases = [
            (["AS", "AH", "AD"], Category::Trail),
            (["5H", "6H", "7H"], Category::PureSequence),
            (["5H", "6S", "7H"], Category::Sequence),
            (["2C", "9C", "KC"], Category::Color),
            (["9C", "9D", "KS"], Category::Pair),
            (["2C", "9D", "KS"], Category::HighCard),
        ];
        for (codes, expected) in cases {
            assert_eq!(evaluate_hand(&hand(codes)).category, expected, "{:?}", codes);
        }
    }

    #[test]
    fn ace_runs_rank_above_king_high_run() {
        let akq = evaluate_hand(&hand(["AS", "KD", "QH"]));
        let a23 = evaluate_hand(&hand(["AS", "2D", "3H"]));
        let kqj = evaluate_hand(&hand(["KS", "QD", "JH"]));
        assert!(akq > a23);
        assert!(a23 > kqj);
    }

    #[test]
    fn pair_tie_break_uses_kicker() {
        let high_kicker = evaluate_hand(&hand(["9C", "9D", "KS"]));
        let low_kicker = evaluate_hand(&hand(["9H", "9S", "4S"]));
        assert_eq!(compare_hands(&high_kicker, &low_kicker), Ordering::Greater);
    }

    #[test]
    fn suits_never_break_ties() {
        let a = hand(["2C", "9D", "KS"]);
        let b = hand(["2D", "9H", "KC"]);
        assert_eq!(compare_cards(&a, &b), Ordering::Equal);
    }

    #[test]
    #[should_panic(expected = "exactly 3 cards")]
    fn wrong_card_count_panics() {
        let cards = [Card::new(Rank::Ace, Suit::Spades); 2];
        evaluate_hand(&cards);
    }

    #[test]
    #[should_panic(expected = "duplicate card")]
    fn duplicate_card_panics() {
        let cards = hand(["AS", "AS", "KD"]);
        evaluate_hand(&cards);
    }
}
