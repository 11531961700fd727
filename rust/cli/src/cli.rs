//! Command-line surface parsed with clap.

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Parser)]
#[command(
    name = "cardtable",
    version,
    about = "Deal, simulate and inspect Teen Patti and Rummy sessions"
)]
pub struct CardtableCli {
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Deal one round and print every hand with its evaluation
    Deal {
        #[arg(long, value_enum)]
        game: Option<GameKind>,
        #[arg(long)]
        seed: Option<u64>,
        #[arg(long)]
        players: Option<usize>,
    },
    /// Play whole sessions with a seeded random policy, one JSON event per line
    Sim {
        #[arg(long, value_enum)]
        game: Option<GameKind>,
        #[arg(long, default_value_t = 1)]
        sessions: u32,
        #[arg(long)]
        rounds: Option<u32>,
        #[arg(long)]
        players: Option<usize>,
        #[arg(long)]
        seed: Option<u64>,
        /// Write events here instead of stdout
        #[arg(long)]
        output: Option<String>,
    },
    /// Show the resolved configuration and where each value came from
    Cfg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    #[value(alias = "teen_patti")]
    TeenPatti,
    Rummy,
}

impl GameKind {
    pub fn player_range(self) -> (usize, usize) {
        use cardtable_engine::{rummy, teen_patti};
        match self {
            GameKind::TeenPatti => (teen_patti::MIN_PLAYERS, teen_patti::MAX_PLAYERS),
            GameKind::Rummy => (rummy::MIN_PLAYERS, rummy::MAX_PLAYERS),
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameKind::TeenPatti => f.write_str("teen_patti"),
            GameKind::Rummy => f.write_str("rummy"),
        }
    }
}
