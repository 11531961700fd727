use serde::{Deserialize, Serialize};
use std::fs;

use crate::cli::GameKind;

pub const ENV_CONFIG: &str = "CARDTABLE_CONFIG";
pub const ENV_SEED: &str = "CARDTABLE_SEED";
pub const ENV_ROUNDS: &str = "CARDTABLE_ROUNDS";
pub const ENV_PLAYERS: &str = "CARDTABLE_PLAYERS";
pub const ENV_GAME: &str = "CARDTABLE_GAME";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub game: GameKind,
    pub seed: Option<u64>,
    /// Rounds per simulated session.
    pub rounds: u32,
    pub players: usize,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ValueSource {
    Default,
    File,
    Env,
}

#[derive(Debug, Clone, Copy)]
pub struct ConfigSources {
    pub game: ValueSource,
    pub seed: ValueSource,
    pub rounds: ValueSource,
    pub players: ValueSource,
}

impl Default for ConfigSources {
    fn default() -> Self {
        Self {
            game: ValueSource::Default,
            seed: ValueSource::Default,
            rounds: ValueSource::Default,
            players: ValueSource::Default,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfigResolved {
    pub config: Config,
    pub sources: ConfigSources,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            game: GameKind::TeenPatti,
            seed: None,
            rounds: 5,
            players: 3,
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(toml::de::Error),
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}
impl From<toml::de::Error> for ConfigError {
    fn from(e: toml::de::Error) -> Self {
        ConfigError::Parse(e)
    }
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Io(e) => write!(f, "cannot read config file: {}", e),
            ConfigError::Parse(e) => write!(f, "cannot parse config file: {}", e),
            ConfigError::Invalid(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Defaults, then the TOML file named by `CARDTABLE_CONFIG`, then
/// `CARDTABLE_*` variables. Command-line flags are applied by each command.
pub fn load_with_sources() -> Result<ConfigResolved, ConfigError> {
    let mut cfg = Config::default();
    let mut sources = ConfigSources::default();

    if let Some(path) = env_value(ENV_CONFIG) {
        let s = fs::read_to_string(path)?;
        let f: FileConfig = toml::from_str(&s)?;
        if let Some(v) = f.game {
            cfg.game = v;
            sources.game = ValueSource::File;
        }
        if let Some(v) = f.seed {
            cfg.seed = Some(v);
            sources.seed = ValueSource::File;
        }
        if let Some(v) = f.rounds {
            cfg.rounds = v;
            sources.rounds = ValueSource::File;
        }
        if let Some(v) = f.players {
            cfg.players = v;
            sources.players = ValueSource::File;
        }
    }

    if let Some(game) = env_value(ENV_GAME) {
        cfg.game = parse_game(&game).ok_or_else(|| ConfigError::Invalid("Invalid game".into()))?;
        sources.game = ValueSource::Env;
    }
    if let Some(seed) = env_value(ENV_SEED) {
        cfg.seed = Some(
            seed.parse()
                .map_err(|_| ConfigError::Invalid("Invalid seed".into()))?,
        );
        sources.seed = ValueSource::Env;
    }
    if let Some(rounds) = env_value(ENV_ROUNDS) {
        cfg.rounds = rounds
            .parse()
            .map_err(|_| ConfigError::Invalid("Invalid rounds".into()))?;
        sources.rounds = ValueSource::Env;
    }
    if let Some(players) = env_value(ENV_PLAYERS) {
        cfg.players = players
            .parse()
            .map_err(|_| ConfigError::Invalid("Invalid players".into()))?;
        sources.players = ValueSource::Env;
    }

    validate(&cfg)?;
    Ok(ConfigResolved {
        config: cfg,
        sources,
    })
}

impl Config {
    /// Command-line flags win over every other source.
    pub fn with_flags(
        mut self,
        game: Option<GameKind>,
        seed: Option<u64>,
        rounds: Option<u32>,
        players: Option<usize>,
    ) -> Result<Config, ConfigError> {
        if let Some(g) = game {
            self.game = g;
        }
        if seed.is_some() {
            self.seed = seed;
        }
        if let Some(r) = rounds {
            self.rounds = r;
        }
        if let Some(p) = players {
            self.players = p;
        }
        validate(&self)?;
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
struct FileConfig {
    #[serde(default)]
    game: Option<GameKind>,
    #[serde(default)]
    seed: Option<u64>,
    #[serde(default)]
    rounds: Option<u32>,
    #[serde(default)]
    players: Option<usize>,
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_game(s: &str) -> Option<GameKind> {
    match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
        "teen_patti" => Some(GameKind::TeenPatti),
        "rummy" => Some(GameKind::Rummy),
        _ => None,
    }
}

pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.rounds == 0 {
        return Err(ConfigError::Invalid(
            "Invalid configuration: rounds must be >=1".into(),
        ));
    }
    let (min, max) = cfg.game.player_range();
    if cfg.players < min || cfg.players > max {
        return Err(ConfigError::Invalid(format!(
            "Invalid configuration: {} takes {}-{} players, got {}",
            cfg.game, min, max, cfg.players
        )));
    }
    Ok(())
}
