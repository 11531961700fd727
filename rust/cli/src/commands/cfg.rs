//! Configuration command handler.
//!
//! Prints the resolved configuration as pretty JSON, each key carrying its
//! value and where it came from:
//!
//! ```json
//! {
//!   "rounds": {
//!     "value": 5,
//!     "source": "default"
//!   },
//!   ...
//! }
//! ```

use crate::config;
use crate::error::CliError;
use crate::ui;
use std::io::Write;

pub fn handle_cfg_command(out: &mut dyn Write, err: &mut dyn Write) -> Result<(), CliError> {
    let resolved = match config::load_with_sources() {
        Ok(r) => r,
        Err(e) => {
            ui::write_error(err, &format!("Invalid configuration: {}", e))?;
            return Err(CliError::Config(format!("Invalid configuration: {}", e)));
        }
    };

    let config::ConfigResolved { config, sources } = resolved;
    let display = serde_json::json!({
        "game": {
            "value": config.game,
            "source": sources.game,
        },
        "seed": {
            "value": config.seed,
            "source": sources.seed,
        },
        "rounds": {
            "value": config.rounds,
            "source": sources.rounds,
        },
        "players": {
            "value": config.players,
            "source": sources.players,
        }
    });
    let json_str = serde_json::to_string_pretty(&display)?;
    writeln!(out, "{}", json_str)?;
    Ok(())
}
