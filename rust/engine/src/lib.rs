//! # cardtable-engine: Card Game Session Core
//!
//! Authoritative, transport-agnostic state machines for turn-based card games
//! played by a small group of connected clients. Two game families are
//! provided: a three-card betting game (Teen Patti) and a 13-card meld game
//! (Rummy). The engine does no I/O and never blocks; callers feed actions in,
//! then drain the queued events and timer commands.
//!
//! ## Core Modules
//!
//! - [`cards`] - Card representation (Suit, Rank, Card) and card codes
//! - [`deck`] - Seeded ChaCha20 RNG and Fisher–Yates shuffling
//! - [`hand`] - Three-card hand ranking and comparison
//! - [`meld`] - Rummy cards, jokers and meld search
//! - [`rules`] - Bet validation for the betting game
//! - [`turns`] - Circular turn rotation
//! - [`teen_patti`] - Betting-game session machine
//! - [`rummy`] - Meld-game session machine
//! - [`events`] - Lifecycle events and public state snapshots
//! - [`timers`] - Pending requests and timer commands
//! - [`logger`] - Human-readable session log
//! - [`config`] - Per-session configuration
//! - [`errors`] - Error types for session operations
//!
//! ## Quick Start
//!
//! ```rust
//! use cardtable_engine::config::TeenPattiConfig;
//! use cardtable_engine::events::SessionEvent;
//! use cardtable_engine::player::RosterPlayer;
//! use cardtable_engine::teen_patti::{TeenPattiAction, TeenPattiSession};
//!
//! let config = TeenPattiConfig { seed: Some(42), ..Default::default() };
//! let mut session = TeenPattiSession::new("s-1", "friday night", config).unwrap();
//! session
//!     .set_players(vec![RosterPlayer::new("p1", "Asha"), RosterPlayer::new("p2", "Bo")])
//!     .unwrap();
//! session.start_round().unwrap();
//! session
//!     .handle_action(TeenPattiAction::Fold { player_id: "p1".into() })
//!     .unwrap();
//!
//! let events = session.drain_events();
//! assert!(events.iter().any(|e| matches!(e, SessionEvent::HandComplete { .. })));
//! ```
//!
//! ## Hand Ranking
//!
//! ```rust
//! use cardtable_engine::cards::Card;
//! use cardtable_engine::hand::{compare_cards, evaluate_hand, Category};
//! use std::cmp::Ordering;
//!
//! let trail: Vec<Card> = ["7C", "7H", "7S"].iter().map(|c| c.parse().unwrap()).collect();
//! let run: Vec<Card> = ["AS", "KS", "QS"].iter().map(|c| c.parse().unwrap()).collect();
//! assert_eq!(evaluate_hand(&trail).category, Category::Trail);
//! assert_eq!(compare_cards(&trail, &run), Ordering::Greater);
//! ```

pub mod cards;
pub mod config;
pub mod deck;
pub mod errors;
pub mod events;
pub mod hand;
pub mod logger;
pub mod meld;
pub mod player;
pub mod rules;
pub mod rummy;
pub mod teen_patti;
pub mod timers;
pub mod turns;

pub use errors::{ActionOutcome, SessionError};
pub use events::{PublicState, SessionEvent};
