//! Command handler modules.
//!
//! Each handler takes its parsed arguments plus the output streams and
//! returns `Result<(), CliError>`; `run` maps the result to an exit code.

pub mod cfg;
pub mod deal;
pub mod sim;

pub use cfg::handle_cfg_command;
pub use deal::handle_deal_command;
pub use sim::{handle_sim_command, SimArgs};
