//! # Cardtable CLI Library
//!
//! Developer command line for the card-game session engine.
//!
//! ## Main Entry Point
//!
//! [`run`] parses the arguments, dispatches to a subcommand and returns the
//! process exit code.
//!
//! ```no_run
//! use std::io;
//! let args = vec!["cardtable", "sim", "--game", "rummy", "--sessions", "3", "--seed", "7"];
//! let code = cardtable_cli::run(args, &mut io::stdout(), &mut io::stderr());
//! assert_eq!(code, 0);
//! ```
//!
//! ## Available Subcommands
//!
//! - `deal`: Deal one seeded round and print every hand with its evaluation
//! - `sim`: Play whole sessions with a seeded random policy, one JSON event per line
//! - `cfg`: Display the resolved configuration and the source of each value

use clap::Parser;
use std::io::Write;
pub mod cli;
mod commands;
pub mod config;
mod error;
pub mod exit_code;
pub mod io_utils;
pub mod selfplay;
pub mod ui;

use cli::{CardtableCli, Commands};
use commands::{handle_cfg_command, handle_deal_command, handle_sim_command, SimArgs};

pub use error::CliError;

const COMMANDS: &[&str] = &["deal", "sim", "cfg"];

/// Runs the CLI against `args` (program name first).
///
/// Returns `0` on success and `2` on any argument or command error.
///
/// ```
/// use std::io;
/// let args = vec!["cardtable", "deal", "--seed", "42"];
/// let code = cardtable_cli::run(args, &mut io::stdout(), &mut io::stderr());
/// assert_eq!(code, 0);
/// ```
pub fn run<I, S>(args: I, out: &mut dyn Write, err: &mut dyn Write) -> i32
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let argv: Vec<String> = args.into_iter().map(|s| s.as_ref().to_string()).collect();

    let cli = match CardtableCli::try_parse_from(&argv) {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;

            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    if write!(out, "{}", e).is_err() {
                        return exit_code::ERROR;
                    }
                    exit_code::SUCCESS
                }
                _ => {
                    if write_usage(err, &e.to_string()).is_err() {
                        return exit_code::ERROR;
                    }
                    exit_code::ERROR
                }
            };
        }
    };

    let result = match cli.cmd {
        Commands::Deal {
            game,
            seed,
            players,
        } => handle_deal_command(game, seed, players, out),
        Commands::Sim {
            game,
            sessions,
            rounds,
            players,
            seed,
            output,
        } => handle_sim_command(
            SimArgs {
                game,
                sessions,
                rounds,
                players,
                seed,
                output,
            },
            out,
            err,
        ),
        Commands::Cfg => handle_cfg_command(out, err),
    };
    match result {
        Ok(()) => exit_code::SUCCESS,
        Err(e) => {
            if writeln!(err, "Error: {}", e).is_err() {
                return exit_code::ERROR;
            }
            exit_code::ERROR
        }
    }
}

fn write_usage(err: &mut dyn Write, clap_error: &str) -> std::io::Result<()> {
    writeln!(err, "{}", clap_error)?;
    writeln!(err)?;
    writeln!(err, "Cardtable CLI")?;
    writeln!(err, "Usage: cardtable <command> [options]\n")?;
    writeln!(err, "Commands:")?;
    for c in COMMANDS {
        writeln!(err, "  {}", c)?;
    }
    writeln!(err, "\nFor full help, run: cardtable --help")
}
