use std::collections::HashSet;

use cardtable_engine::cards::{full_deck, Card};
use cardtable_engine::deck::{session_rng, shuffle, Deck};
use cardtable_engine::meld::build_deck;

#[test]
fn shuffled_deck_is_a_permutation() {
    for seed in 0..50u64 {
        let mut rng = session_rng(Some(seed));
        let mut deck = full_deck();
        shuffle(&mut deck, &mut rng);
        assert_eq!(deck.len(), 52);
        let unique: HashSet<Card> = deck.iter().copied().collect();
        assert_eq!(unique.len(), 52, "seed {} duplicated a card", seed);
        let mut sorted = deck.clone();
        sorted.sort();
        let mut fresh = full_deck();
        fresh.sort();
        assert_eq!(sorted, fresh, "seed {} changed the multiset", seed);
    }
}

#[test]
fn rummy_deck_shuffle_keeps_jokers() {
    let mut rng = session_rng(Some(9));
    let mut deck = build_deck(2);
    shuffle(&mut deck, &mut rng);
    assert_eq!(deck.len(), 54);
    assert_eq!(deck.iter().filter(|c| c.standard().is_none()).count(), 2);
}

#[test]
fn shuffle_is_deterministic_with_same_seed() {
    let a = Deck::shuffled(full_deck(), &mut session_rng(Some(12345))).deal_n(10);
    let b = Deck::shuffled(full_deck(), &mut session_rng(Some(12345))).deal_n(10);
    assert_eq!(a, b, "same seed must yield identical order");
}

#[test]
fn shuffle_differs_with_different_seed() {
    let a = Deck::shuffled(full_deck(), &mut session_rng(Some(1))).deal_n(10);
    let b = Deck::shuffled(full_deck(), &mut session_rng(Some(2))).deal_n(10);
    assert_ne!(
        a, b,
        "different seeds should produce different orders (high probability)"
    );
}

#[test]
fn every_position_is_reachable_with_even_frequency() {
    // 3 items have 6 permutations; each should show up close to 1/6 of the time.
    let trials = 60_000;
    let mut rng = session_rng(Some(2024));
    let mut counts = std::collections::HashMap::new();
    for _ in 0..trials {
        let mut items = [0u8, 1, 2];
        shuffle(&mut items, &mut rng);
        *counts.entry(items).or_insert(0u32) += 1;
    }
    assert_eq!(counts.len(), 6, "some permutation never appeared");
    let expected = trials as f64 / 6.0;
    for (perm, n) in counts {
        let deviation = (n as f64 - expected).abs() / expected;
        assert!(
            deviation < 0.05,
            "permutation {:?} seen {} times, expected about {}",
            perm,
            n,
            expected
        );
    }
}

#[test]
fn first_card_is_spread_over_the_deck() {
    let trials = 52 * 400;
    let mut rng = session_rng(Some(77));
    let mut firsts = std::collections::HashMap::new();
    for _ in 0..trials {
        let mut deck = full_deck();
        shuffle(&mut deck, &mut rng);
        *firsts.entry(deck[0]).or_insert(0u32) += 1;
    }
    assert_eq!(firsts.len(), 52);
    // loose bound, 400 expected per card
    assert!(firsts.values().all(|&n| (250..=550).contains(&n)));
}
