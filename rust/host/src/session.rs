//! Hosted sessions and the manager that routes calls to them.
//!
//! Each session's machine sits behind its own mutex, so at most one action is
//! applied to a session at a time while distinct sessions run independently.
//! After every call the manager drains the machine: events go to the
//! [`EventBus`], timer commands arm or abort tokio tasks. A fired timer locks
//! the session and re-enters the machine with an expire action.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};

use cardtable_engine::player::RosterPlayer;
use cardtable_engine::timers::{TimerCommand, TimerKey};
use cardtable_engine::{ActionOutcome, PublicState};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::errors::HostError;
use crate::events::{EventBus, EventSubscription};
use crate::registry::{GameMachine, GameRegistry, SessionSpec};
use crate::settings::HostSettings;

pub type SessionId = String;

/// Listing entry for a hosted session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub game: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub is_active: bool,
}

pub struct HostedSession {
    id: SessionId,
    name: String,
    game: &'static str,
    created_at: DateTime<Utc>,
    machine: Mutex<Box<dyn GameMachine>>,
    timers: Mutex<HashMap<TimerKey, AbortHandle>>,
}

impl std::fmt::Debug for HostedSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostedSession")
            .field("id", &self.id)
            .field("game", &self.game)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl HostedSession {
    fn new(id: SessionId, name: String, machine: Box<dyn GameMachine>) -> Self {
        Self {
            id,
            name,
            game: machine.game(),
            created_at: Utc::now(),
            machine: Mutex::new(machine),
            timers: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn game(&self) -> &'static str {
        self.game
    }

    /// Timers scheduled and not yet fired or cancelled.
    pub fn armed_timers(&self) -> usize {
        self.lock_timers().len()
    }

    pub fn info(&self) -> SessionInfo {
        SessionInfo {
            session_id: self.id.clone(),
            game: self.game.to_string(),
            name: self.name.clone(),
            created_at: self.created_at,
            is_active: self.lock_machine().is_active(),
        }
    }

    fn lock_machine(&self) -> MutexGuard<'_, Box<dyn GameMachine>> {
        self.machine.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_timers(&self) -> MutexGuard<'_, HashMap<TimerKey, AbortHandle>> {
        self.timers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` against the machine, then publishes whatever it queued.
    fn run<T>(
        self: &Arc<Self>,
        bus: &EventBus,
        f: impl FnOnce(&mut dyn GameMachine) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let mut machine = self.lock_machine();
        let result = f(machine.as_mut());
        let events = machine.drain_events();
        let commands = machine.drain_timer_commands();
        for event in events {
            bus.broadcast(&self.id, event);
        }
        self.apply_timer_commands(commands, bus);
        drop(machine);
        result
    }

    fn apply_timer_commands(self: &Arc<Self>, commands: Vec<TimerCommand>, bus: &EventBus) {
        if commands.is_empty() {
            return;
        }
        let mut timers = self.lock_timers();
        for command in commands {
            match command {
                TimerCommand::Schedule { key, after } => {
                    let Ok(runtime) = Handle::try_current() else {
                        tracing::warn!(
                            session_id = %self.id,
                            kind = %key.kind,
                            request_id = key.request_id,
                            "no tokio runtime, request timer not armed"
                        );
                        continue;
                    };
                    let deadline = tokio::time::Instant::now() + after;
                    let session = Arc::downgrade(self);
                    let bus = bus.clone();
                    let task = runtime.spawn(async move {
                        tokio::time::sleep_until(deadline).await;
                        fire(session, key, &bus);
                    });
                    tracing::debug!(
                        session_id = %self.id,
                        kind = %key.kind,
                        request_id = key.request_id,
                        after_secs = after.as_secs(),
                        "request timer armed"
                    );
                    if let Some(previous) = timers.insert(key, task.abort_handle()) {
                        previous.abort();
                    }
                }
                TimerCommand::Cancel { key } => {
                    if let Some(handle) = timers.remove(&key) {
                        handle.abort();
                        tracing::debug!(
                            session_id = %self.id,
                            kind = %key.kind,
                            request_id = key.request_id,
                            "request timer cancelled"
                        );
                    }
                }
            }
        }
    }

    fn abort_timers(&self) {
        for (_, handle) in self.lock_timers().drain() {
            handle.abort();
        }
    }
}

/// Timer body: re-enters the session through its expire action. A session
/// that is gone, or a request that was already settled, makes this a no-op.
fn fire(session: Weak<HostedSession>, key: TimerKey, bus: &EventBus) {
    let Some(session) = session.upgrade() else {
        return;
    };
    session.lock_timers().remove(&key);
    tracing::info!(
        session_id = %session.id,
        kind = %key.kind,
        request_id = key.request_id,
        "request timer fired"
    );
    if let Err(e) = session.run(bus, |m| Ok(m.expire(key)?)) {
        tracing::warn!(session_id = %session.id, error = %e, "expired request was rejected");
    }
}

#[derive(Debug)]
pub struct SessionManager {
    sessions: RwLock<HashMap<SessionId, Arc<HostedSession>>>,
    registry: GameRegistry,
    event_bus: Arc<EventBus>,
    settings: HostSettings,
}

impl SessionManager {
    pub fn new(settings: HostSettings) -> Result<Self, HostError> {
        Self::with_registry(settings, GameRegistry::with_builtin_games())
    }

    pub fn with_registry(settings: HostSettings, registry: GameRegistry) -> Result<Self, HostError> {
        settings.validate()?;
        Ok(Self {
            sessions: RwLock::new(HashMap::new()),
            registry,
            event_bus: Arc::new(EventBus::with_buffer(settings.event_buffer)),
            settings,
        })
    }

    pub fn settings(&self) -> &HostSettings {
        &self.settings
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub fn event_bus(&self) -> Arc<EventBus> {
        Arc::clone(&self.event_bus)
    }

    pub fn subscribe(&self, session_id: &str) -> Result<EventSubscription, HostError> {
        let session = self.get_session(session_id)?;
        Ok(self.event_bus.subscribe(session.id.clone()))
    }

    /// Builds a session of `game` from a JSON config; `Value::Null` means
    /// all defaults.
    pub fn create_session(
        &self,
        game: &str,
        name: &str,
        config: Value,
    ) -> Result<SessionId, HostError> {
        let id = Uuid::new_v4().to_string();
        let spec = SessionSpec {
            id: id.clone(),
            name: name.to_string(),
            config,
            default_request_timeout_secs: self.settings.default_request_timeout_secs,
        };
        let machine = self.registry.create(game, &spec)?;
        let session = Arc::new(HostedSession::new(id.clone(), name.to_string(), machine));

        {
            let mut guard = self
                .sessions
                .write()
                .map_err(|_| HostError::StoragePoisoned)?;
            if guard.len() >= self.settings.max_sessions {
                return Err(HostError::TooManySessions {
                    max: self.settings.max_sessions,
                });
            }
            guard.insert(id.clone(), session);
        }

        tracing::info!(session_id = %id, game, name, "session created");
        Ok(id)
    }

    pub fn get_session(&self, session_id: &str) -> Result<Arc<HostedSession>, HostError> {
        let guard = self
            .sessions
            .read()
            .map_err(|_| HostError::StoragePoisoned)?;
        guard
            .get(session_id)
            .cloned()
            .ok_or_else(|| HostError::SessionNotFound(session_id.to_string()))
    }

    pub fn set_players(&self, session_id: &str, players: Vec<RosterPlayer>) -> Result<(), HostError> {
        self.with_machine(session_id, |m| Ok(m.set_players(players)?))
    }

    pub fn add_player(&self, session_id: &str, player: RosterPlayer) -> Result<(), HostError> {
        self.with_machine(session_id, |m| Ok(m.add_player(player)?))
    }

    pub fn remove_player(&self, session_id: &str, player_id: &str) -> Result<(), HostError> {
        self.with_machine(session_id, |m| Ok(m.remove_player(player_id)?))
    }

    pub fn start_round(&self, session_id: &str) -> Result<(), HostError> {
        self.with_machine(session_id, |m| Ok(m.start_round()?))
    }

    /// Applies one `{ "type": ..., ... }` action.
    pub fn handle_action(&self, session_id: &str, action: Value) -> Result<(), HostError> {
        self.with_machine(session_id, |m| m.handle_json(action))
    }

    /// Like [`handle_action`](Self::handle_action), projected to the
    /// `{ success, error }` shape relayed to clients.
    pub fn dispatch(&self, session_id: &str, action: Value) -> ActionOutcome {
        match self.handle_action(session_id, action) {
            Ok(()) => ActionOutcome::ok(),
            Err(e) => ActionOutcome::failed(e.to_string()),
        }
    }

    pub fn public_state(&self, session_id: &str) -> Result<PublicState, HostError> {
        let session = self.get_session(session_id)?;
        let state = session.lock_machine().public_state();
        Ok(state)
    }

    pub fn player_hand(&self, session_id: &str, player_id: &str) -> Result<Value, HostError> {
        let session = self.get_session(session_id)?;
        let hand = session.lock_machine().player_hand(player_id);
        hand
    }

    pub fn sessions(&self) -> Vec<SessionInfo> {
        let sessions: Vec<Arc<HostedSession>> = match self.sessions.read() {
            Ok(guard) => guard.values().cloned().collect(),
            Err(_) => Vec::new(),
        };
        let mut infos: Vec<SessionInfo> = sessions.iter().map(|s| s.info()).collect();
        infos.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.session_id.cmp(&b.session_id)));
        infos
    }

    pub fn active_sessions(&self) -> Vec<SessionId> {
        match self.sessions.read() {
            Ok(guard) => guard.keys().cloned().collect(),
            Err(_) => Vec::new(),
        }
    }

    /// Removes the session, aborting its timers and dropping its subscribers.
    pub fn delete_session(&self, session_id: &str) -> Result<(), HostError> {
        let removed = self
            .sessions
            .write()
            .map_err(|_| HostError::StoragePoisoned)?
            .remove(session_id);
        let session = removed.ok_or_else(|| HostError::SessionNotFound(session_id.to_string()))?;
        session.abort_timers();
        self.event_bus.drop_session(session_id);
        tracing::info!(session_id = %session_id, "session deleted");
        Ok(())
    }

    fn with_machine<T>(
        &self,
        session_id: &str,
        f: impl FnOnce(&mut dyn GameMachine) -> Result<T, HostError>,
    ) -> Result<T, HostError> {
        let session = self.get_session(session_id)?;
        session.run(&self.event_bus, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn manager() -> SessionManager {
        SessionManager::new(HostSettings::default()).unwrap()
    }

    #[test]
    fn create_and_delete_session() {
        let m = manager();
        let id = m.create_session("teen_patti", "table", Value::Null).unwrap();
        assert_eq!(m.active_sessions(), vec![id.clone()]);
        assert_eq!(m.get_session(&id).unwrap().game(), "teen_patti");
        m.delete_session(&id).unwrap();
        assert!(matches!(
            m.public_state(&id),
            Err(HostError::SessionNotFound(_))
        ));
        assert!(m.delete_session(&id).is_err());
    }

    #[test]
    fn session_cap_is_enforced() {
        let m = SessionManager::new(HostSettings {
            max_sessions: 1,
            ..Default::default()
        })
        .unwrap();
        m.create_session("rummy", "a", Value::Null).unwrap();
        let err = m.create_session("rummy", "b", Value::Null).unwrap_err();
        assert!(matches!(err, HostError::TooManySessions { max: 1 }));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let err = SessionManager::new(HostSettings {
            event_buffer: 0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, HostError::Settings(_)));
    }

    #[test]
    fn dispatch_reports_outcome() {
        let m = manager();
        let id = m.create_session("teen_patti", "table", json!({ "seed": 4 })).unwrap();
        m.set_players(
            &id,
            vec![RosterPlayer::new("a", "Ann"), RosterPlayer::new("b", "Ben")],
        )
        .unwrap();
        m.start_round(&id).unwrap();

        let outcome = m.dispatch(&id, json!({ "type": "SEEN", "player_id": "b" }));
        assert!(!outcome.success);
        assert!(outcome.error.unwrap().contains("turn"));

        let outcome = m.dispatch(&id, json!({ "type": "SEEN", "player_id": "a" }));
        assert_eq!(outcome, ActionOutcome::ok());

        let outcome = m.dispatch(&id, json!({ "type": "NOPE" }));
        assert!(!outcome.success);
    }

    #[test]
    fn schedule_without_runtime_is_skipped() {
        let m = manager();
        let id = m.create_session("rummy", "table", json!({ "seed": 2 })).unwrap();
        m.set_players(
            &id,
            vec![RosterPlayer::new("a", "Ann"), RosterPlayer::new("b", "Ben")],
        )
        .unwrap();
        m.start_round(&id).unwrap();
        let session = m.get_session(&id).unwrap();
        let hand = m.player_hand(&id, "a").unwrap();
        assert_eq!(hand["cards"].as_array().map(Vec::len), Some(13));
        // declaring opens a request; no runtime here, so nothing is armed
        let outcome = m.dispatch(&id, json!({ "type": "DECLARE_RUMMY", "player_id": "a" }));
        assert!(outcome.success);
        assert_eq!(session.armed_timers(), 0);
    }
}
