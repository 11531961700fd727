//! Deal command handler: one seeded deal, every hand evaluated.

use std::cmp::Ordering;
use std::io::Write;

use cardtable_engine::cards::full_deck;
use cardtable_engine::deck::{session_rng, Deck};
use cardtable_engine::hand::compare_cards;
use cardtable_engine::meld::{build_deck, evaluate_rummy_hand, wild_rank_for, RummyCard};

use crate::cli::GameKind;
use crate::config;
use crate::error::CliError;
use crate::selfplay::{rummy_hands, teen_patti_hands, teen_patti_label};
use crate::ui::card_line;

/// Printed jokers in the meld deck dealt by this command.
const PRINTED_JOKERS: u8 = 2;

/// Deals one round and prints each hand. The same seed always prints the
/// same table.
pub fn handle_deal_command(
    game: Option<GameKind>,
    seed: Option<u64>,
    players: Option<usize>,
    out: &mut dyn Write,
) -> Result<(), CliError> {
    let cfg = config::load_with_sources()?
        .config
        .with_flags(game, seed, None, players)?;
    let seed = cfg.seed.unwrap_or_else(rand::random);
    let mut rng = session_rng(Some(seed));

    writeln!(out, "Game: {}", cfg.game)?;
    writeln!(out, "Seed: {}", seed)?;
    match cfg.game {
        GameKind::TeenPatti => {
            let deck = Deck::shuffled(full_deck(), &mut rng).into_remaining();
            let hands = teen_patti_hands(&deck, cfg.players);
            for (i, hand) in hands.iter().enumerate() {
                writeln!(out, "P{}: {} ({})", i + 1, card_line(hand), teen_patti_label(hand))?;
            }
            let best = (0..hands.len()).reduce(|best, i| {
                match compare_cards(&hands[i], &hands[best]) {
                    Ordering::Greater => i,
                    _ => best,
                }
            });
            if let Some(b) = best {
                writeln!(out, "Best: P{} ({})", b + 1, teen_patti_label(&hands[b]))?;
            }
        }
        GameKind::Rummy => {
            let deck: Vec<RummyCard> =
                Deck::shuffled(build_deck(PRINTED_JOKERS), &mut rng).into_remaining();
            let (hands, cut) = rummy_hands(&deck, cfg.players);
            let cut = cut.ok_or_else(|| {
                CliError::InvalidInput(format!("{} players leave no closed joker", cfg.players))
            })?;
            let wild = wild_rank_for(cut);
            writeln!(out, "Closed joker: {} (wild {})", cut, wild.code())?;
            for (i, hand) in hands.iter().enumerate() {
                let eval = evaluate_rummy_hand(hand, wild);
                writeln!(
                    out,
                    "P{}: {} | melds {}, deadwood {}",
                    i + 1,
                    card_line(hand),
                    eval.melds.len(),
                    eval.penalty_points()
                )?;
            }
            let drawn = cfg.players * hands.first().map_or(0, Vec::len) + 1;
            writeln!(out, "Draw pile: {}", deck.len().saturating_sub(drawn))?;
        }
    }
    Ok(())
}
