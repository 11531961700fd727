//! Game registry: maps a game code to a session constructor.
//!
//! Every hosted game implements [`GameMachine`], the object-safe surface the
//! session manager drives. Actions and configs arrive as JSON and are decoded
//! into the game's own types here, so the manager never names a variant.

use std::collections::BTreeMap;

use cardtable_engine::config::{RummyConfig, TeenPattiConfig};
use cardtable_engine::player::RosterPlayer;
use cardtable_engine::rummy::{RummyAction, RummySession};
use cardtable_engine::teen_patti::{TeenPattiAction, TeenPattiSession};
use cardtable_engine::timers::{TimerCommand, TimerKey};
use cardtable_engine::{PublicState, SessionError, SessionEvent};
use serde_json::Value;

use crate::errors::HostError;

pub const TEEN_PATTI: &str = "teen_patti";
pub const RUMMY: &str = "rummy";

/// A session state machine as seen by the host.
pub trait GameMachine: Send {
    fn game(&self) -> &'static str;
    fn set_players(&mut self, players: Vec<RosterPlayer>) -> Result<(), SessionError>;
    fn add_player(&mut self, player: RosterPlayer) -> Result<(), SessionError>;
    fn remove_player(&mut self, player_id: &str) -> Result<(), SessionError>;
    fn start_round(&mut self) -> Result<(), SessionError>;
    /// Decodes a `{ "type": ..., ... }` action and applies it.
    fn handle_json(&mut self, action: Value) -> Result<(), HostError>;
    /// Re-enters the machine when a request timer fires.
    fn expire(&mut self, key: TimerKey) -> Result<(), SessionError>;
    fn public_state(&self) -> PublicState;
    fn player_hand(&self, player_id: &str) -> Result<Value, HostError>;
    fn is_active(&self) -> bool;
    fn drain_events(&mut self) -> Vec<SessionEvent>;
    fn drain_timer_commands(&mut self) -> Vec<TimerCommand>;
}

impl GameMachine for TeenPattiSession {
    fn game(&self) -> &'static str {
        TEEN_PATTI
    }

    fn set_players(&mut self, players: Vec<RosterPlayer>) -> Result<(), SessionError> {
        TeenPattiSession::set_players(self, players)
    }

    fn add_player(&mut self, player: RosterPlayer) -> Result<(), SessionError> {
        TeenPattiSession::add_player(self, player)
    }

    fn remove_player(&mut self, player_id: &str) -> Result<(), SessionError> {
        TeenPattiSession::remove_player(self, player_id)
    }

    fn start_round(&mut self) -> Result<(), SessionError> {
        TeenPattiSession::start_round(self)
    }

    fn handle_json(&mut self, action: Value) -> Result<(), HostError> {
        let action: TeenPattiAction =
            serde_json::from_value(action).map_err(HostError::InvalidAction)?;
        self.handle_action(action)?;
        Ok(())
    }

    fn expire(&mut self, key: TimerKey) -> Result<(), SessionError> {
        self.handle_action(TeenPattiAction::ExpireRequest {
            kind: key.kind,
            request_id: key.request_id,
        })
    }

    fn public_state(&self) -> PublicState {
        PublicState::TeenPatti(TeenPattiSession::public_state(self))
    }

    fn player_hand(&self, player_id: &str) -> Result<Value, HostError> {
        let view = TeenPattiSession::player_hand(self, player_id)?;
        serde_json::to_value(view).map_err(HostError::Encode)
    }

    fn is_active(&self) -> bool {
        TeenPattiSession::is_active(self)
    }

    fn drain_events(&mut self) -> Vec<SessionEvent> {
        TeenPattiSession::drain_events(self)
    }

    fn drain_timer_commands(&mut self) -> Vec<TimerCommand> {
        TeenPattiSession::drain_timer_commands(self)
    }
}

impl GameMachine for RummySession {
    fn game(&self) -> &'static str {
        RUMMY
    }

    fn set_players(&mut self, players: Vec<RosterPlayer>) -> Result<(), SessionError> {
        RummySession::set_players(self, players)
    }

    fn add_player(&mut self, player: RosterPlayer) -> Result<(), SessionError> {
        RummySession::add_player(self, player)
    }

    fn remove_player(&mut self, player_id: &str) -> Result<(), SessionError> {
        RummySession::remove_player(self, player_id)
    }

    fn start_round(&mut self) -> Result<(), SessionError> {
        RummySession::start_round(self)
    }

    fn handle_json(&mut self, action: Value) -> Result<(), HostError> {
        let action: RummyAction = serde_json::from_value(action).map_err(HostError::InvalidAction)?;
        self.handle_action(action)?;
        Ok(())
    }

    fn expire(&mut self, key: TimerKey) -> Result<(), SessionError> {
        self.handle_action(RummyAction::ExpireRequest {
            kind: key.kind,
            request_id: key.request_id,
        })
    }

    fn public_state(&self) -> PublicState {
        PublicState::Rummy(RummySession::public_state(self))
    }

    fn player_hand(&self, player_id: &str) -> Result<Value, HostError> {
        let view = RummySession::player_hand(self, player_id)?;
        serde_json::to_value(view).map_err(HostError::Encode)
    }

    fn is_active(&self) -> bool {
        RummySession::is_active(self)
    }

    fn drain_events(&mut self) -> Vec<SessionEvent> {
        RummySession::drain_events(self)
    }

    fn drain_timer_commands(&mut self) -> Vec<TimerCommand> {
        RummySession::drain_timer_commands(self)
    }
}

/// Everything a constructor needs to build one session.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    pub id: String,
    pub name: String,
    pub config: Value,
    /// Used when `config` carries no `request_timeout_secs`.
    pub default_request_timeout_secs: u64,
}

impl SessionSpec {
    /// The config object with the host's timeout default filled in.
    fn config_with_defaults(&self) -> Value {
        let mut config = match &self.config {
            Value::Null => Value::Object(Default::default()),
            other => other.clone(),
        };
        if let Value::Object(map) = &mut config {
            map.entry("request_timeout_secs")
                .or_insert_with(|| Value::from(self.default_request_timeout_secs));
        }
        config
    }
}

pub type Constructor = fn(&SessionSpec) -> Result<Box<dyn GameMachine>, HostError>;

fn build_teen_patti(spec: &SessionSpec) -> Result<Box<dyn GameMachine>, HostError> {
    let config: TeenPattiConfig =
        serde_json::from_value(spec.config_with_defaults()).map_err(HostError::InvalidConfig)?;
    Ok(Box::new(TeenPattiSession::new(
        spec.id.clone(),
        spec.name.clone(),
        config,
    )?))
}

fn build_rummy(spec: &SessionSpec) -> Result<Box<dyn GameMachine>, HostError> {
    let config: RummyConfig =
        serde_json::from_value(spec.config_with_defaults()).map_err(HostError::InvalidConfig)?;
    Ok(Box::new(RummySession::new(
        spec.id.clone(),
        spec.name.clone(),
        config,
    )?))
}

#[derive(Debug, Clone)]
pub struct GameRegistry {
    constructors: BTreeMap<&'static str, Constructor>,
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::with_builtin_games()
    }
}

impl GameRegistry {
    pub fn empty() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn with_builtin_games() -> Self {
        let mut registry = Self::empty();
        registry.register(TEEN_PATTI, build_teen_patti);
        registry.register(RUMMY, build_rummy);
        registry
    }

    /// Registers `code`, replacing any earlier constructor for it.
    pub fn register(&mut self, code: &'static str, constructor: Constructor) {
        self.constructors.insert(code, constructor);
    }

    pub fn games(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }

    pub fn create(&self, code: &str, spec: &SessionSpec) -> Result<Box<dyn GameMachine>, HostError> {
        let constructor = self
            .constructors
            .get(code)
            .ok_or_else(|| HostError::UnknownGame(code.to_string()))?;
        constructor(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn spec(config: Value) -> SessionSpec {
        SessionSpec {
            id: "s1".into(),
            name: "table".into(),
            config,
            default_request_timeout_secs: 45,
        }
    }

    #[test]
    fn builtin_games_are_registered() {
        assert_eq!(GameRegistry::default().games(), vec![RUMMY, TEEN_PATTI]);
    }

    #[test]
    fn unknown_game_is_rejected() {
        let err = GameRegistry::default()
            .create("poker", &spec(Value::Null))
            .err()
            .unwrap();
        assert!(matches!(err, HostError::UnknownGame(code) if code == "poker"));
    }

    #[test]
    fn host_timeout_fills_missing_config_value() {
        let filled = spec(json!({ "seed": 1 })).config_with_defaults();
        assert_eq!(filled["request_timeout_secs"], 45);
        let kept = spec(json!({ "request_timeout_secs": 5 })).config_with_defaults();
        assert_eq!(kept["request_timeout_secs"], 5);
    }

    #[test]
    fn config_is_decoded_and_validated() {
        let registry = GameRegistry::default();
        let machine = registry
            .create(RUMMY, &spec(json!({ "limit": { "type": "points", "value": 101 } })))
            .unwrap();
        assert_eq!(machine.game(), RUMMY);

        let err = registry
            .create(TEEN_PATTI, &spec(json!({ "initial_stake": 1 })))
            .err()
            .unwrap();
        assert!(matches!(err, HostError::Session(SessionError::InvalidConfig(_))));

        let err = registry
            .create(TEEN_PATTI, &spec(json!({ "round_limit": "ten" })))
            .err()
            .unwrap();
        assert!(matches!(err, HostError::InvalidConfig(_)));
    }

    #[test]
    fn actions_decode_per_game() {
        let registry = GameRegistry::default();
        let mut machine = registry.create(TEEN_PATTI, &spec(Value::Null)).unwrap();
        let err = machine
            .handle_json(json!({ "type": "DRAW_CARD", "player_id": "a", "source": "draw_pile" }))
            .unwrap_err();
        assert!(matches!(err, HostError::InvalidAction(_)));
        let err = machine
            .handle_json(json!({ "type": "SEEN", "player_id": "a" }))
            .unwrap_err();
        assert!(matches!(err, HostError::Session(_)));
    }
}
