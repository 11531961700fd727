//! Simulation command handler.
//!
//! Plays whole sessions with the seeded random policy and writes every
//! emitted event as one JSON line, to `--output` (appending) or to stdout.
//! Session `k` is seeded with `seed + k`, so a run replays exactly.

use std::io::Write;
use std::path::PathBuf;

use crate::cli::GameKind;
use crate::config;
use crate::error::CliError;
use crate::io_utils::open_jsonl;
use crate::selfplay::{RummySelfPlay, SimOutcome, TeenPattiSelfPlay};
use crate::ui;

#[derive(Debug, Clone, Default)]
pub struct SimArgs {
    pub game: Option<GameKind>,
    pub sessions: u32,
    pub rounds: Option<u32>,
    pub players: Option<usize>,
    pub seed: Option<u64>,
    pub output: Option<String>,
}

pub fn handle_sim_command(
    args: SimArgs,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<(), CliError> {
    if args.sessions == 0 {
        ui::write_error(err, "sessions must be >= 1")?;
        return Err(CliError::InvalidInput("sessions must be >= 1".to_string()));
    }
    let cfg = config::load_with_sources()?
        .config
        .with_flags(args.game, args.seed, args.rounds, args.players)?;
    let base_seed = cfg.seed.unwrap_or_else(rand::random);

    let mut file = match &args.output {
        Some(p) => Some(open_jsonl(&PathBuf::from(p)).map_err(CliError::InvalidInput)?),
        None => None,
    };

    let mut outcomes: Vec<SimOutcome> = Vec::with_capacity(args.sessions as usize);
    for k in 0..args.sessions {
        let seed = base_seed.wrapping_add(u64::from(k));
        let id = format!("sim-{}-{}", base_seed, k);
        let sink: &mut dyn Write = match file.as_mut() {
            Some(f) => f,
            None => &mut *out,
        };
        let outcome = match cfg.game {
            GameKind::TeenPatti => {
                TeenPattiSelfPlay::new(&id, cfg.players, cfg.rounds, seed)?.run(sink)?
            }
            GameKind::Rummy => RummySelfPlay::new(&id, cfg.players, cfg.rounds, seed)?.run(sink)?,
        };
        if outcome.summary.is_none() {
            ui::display_warning(err, &format!("{} stopped before its final summary", id))?;
        }
        outcomes.push(outcome);
    }
    if let Some(f) = file.as_mut() {
        f.flush()?;
    }

    // With no output file stdout carries the event stream.
    if file.is_some() {
        write_report(out, &outcomes, base_seed)?;
    } else {
        write_report(err, &outcomes, base_seed)?;
    }
    Ok(())
}

fn write_report(report: &mut dyn Write, outcomes: &[SimOutcome], seed: u64) -> Result<(), CliError> {
    let rounds: u32 = outcomes.iter().map(|o| o.rounds).sum();
    let events: usize = outcomes.iter().map(|o| o.events).sum();
    writeln!(
        report,
        "Simulated: {} sessions, {} rounds, {} events (seed {})",
        outcomes.len(),
        rounds,
        events,
        seed
    )?;
    for o in outcomes {
        if let Some(w) = o.summary.as_ref().and_then(|s| s.winner.as_ref()) {
            writeln!(report, "  {}: winner {} ({} chips)", o.session_id, w.player_id, w.balance)?;
        }
    }
    Ok(())
}
