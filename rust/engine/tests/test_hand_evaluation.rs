use std::cmp::Ordering;

use cardtable_engine::cards::{full_deck, Card, Rank};
use cardtable_engine::deck::{session_rng, shuffle};
use cardtable_engine::hand::{compare_hands, evaluate_hand, Category, HandStrength};
use cardtable_engine::meld::{evaluate_rummy_hand, RummyCard};

fn hand(codes: [&str; 3]) -> Vec<Card> {
    codes.iter().map(|c| c.parse().unwrap()).collect()
}

fn random_hands(seed: u64, n: usize) -> Vec<HandStrength> {
    let mut rng = session_rng(Some(seed));
    (0..n)
        .map(|_| {
            let mut deck = full_deck();
            shuffle(&mut deck, &mut rng);
            evaluate_hand(&deck[..3])
        })
        .collect()
}

#[test]
fn any_trail_beats_any_pure_sequence() {
    let lowest_trail = evaluate_hand(&hand(["2C", "2D", "2H"]));
    let best_run = evaluate_hand(&hand(["AS", "KS", "QS"]));
    assert_eq!(compare_hands(&lowest_trail, &best_run), Ordering::Greater);
}

#[test]
fn category_ladder_is_ordered() {
    let ladder = [
        hand(["2C", "7D", "9H"]),
        hand(["2C", "2D", "9H"]),
        hand(["2C", "7C", "9C"]),
        hand(["4C", "5D", "6H"]),
        hand(["4C", "5C", "6C"]),
        hand(["4C", "4D", "4H"]),
    ];
    let categories: Vec<Category> = ladder.iter().map(|h| evaluate_hand(h).category).collect();
    assert_eq!(
        categories,
        vec![
            Category::HighCard,
            Category::Pair,
            Category::Color,
            Category::Sequence,
            Category::PureSequence,
            Category::Trail,
        ]
    );
    for pair in ladder.windows(2) {
        assert_eq!(
            compare_hands(&evaluate_hand(&pair[1]), &evaluate_hand(&pair[0])),
            Ordering::Greater
        );
    }
}

#[test]
fn compare_is_a_strict_total_order() {
    let hands = random_hands(5, 120);
    for a in &hands {
        assert_eq!(compare_hands(a, a), Ordering::Equal);
        for b in &hands {
            let ab = compare_hands(a, b);
            assert_eq!(ab, compare_hands(b, a).reverse(), "antisymmetry");
            if ab == Ordering::Greater {
                assert!(a.category >= b.category, "consistent with category");
            }
            for c in &hands {
                if ab == Ordering::Greater && compare_hands(b, c) == Ordering::Greater {
                    assert_eq!(compare_hands(a, c), Ordering::Greater, "transitivity");
                }
            }
        }
    }
}

#[test]
fn king_high_run_beats_lower_runs() {
    let kqj = evaluate_hand(&hand(["KS", "QD", "JH"]));
    let low = evaluate_hand(&hand(["4S", "3D", "2H"]));
    assert_eq!(compare_hands(&kqj, &low), Ordering::Greater);
}

#[test]
fn rummy_hand_without_pure_sequence_is_never_complete() {
    // Three sets and a joker-built run, but nothing pure.
    let cards: Vec<RummyCard> = [
        "5C", "5D", "5H", "8C", "8D", "8S", "KC", "KD", "KH", "2S", "4S", "JK1", "3D",
    ]
    .iter()
    .map(|c| c.parse().unwrap())
    .collect();
    let eval = evaluate_rummy_hand(&cards, Rank::Nine);
    assert!(!eval.has_pure_sequence());
    assert!(!eval.is_complete());
    assert_eq!(eval.penalty_points(), eval.total_points);
}
