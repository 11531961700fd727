use cardtable_engine::SessionError;
use thiserror::Error;

use crate::session::SessionId;
use crate::settings::SettingsError;

/// Errors surfaced by the session host.
///
/// Game-rule rejections keep their engine error in [`HostError::Session`];
/// everything else is a routing or decoding problem on the host side.
#[derive(Debug, Error)]
pub enum HostError {
    #[error("Unknown game: {0}")]
    UnknownGame(String),
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),
    #[error("Session limit of {max} reached")]
    TooManySessions { max: usize },
    #[error("Invalid game config: {0}")]
    InvalidConfig(#[source] serde_json::Error),
    #[error("Invalid action payload: {0}")]
    InvalidAction(#[source] serde_json::Error),
    #[error("Could not encode view: {0}")]
    Encode(#[source] serde_json::Error),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error(transparent)]
    Session(#[from] SessionError),
    #[error("Session storage poisoned")]
    StoragePoisoned,
}

impl HostError {
    /// Machine-readable code for relaying to clients.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::UnknownGame(_) => "unknown_game",
            HostError::SessionNotFound(_) => "session_not_found",
            HostError::TooManySessions { .. } => "too_many_sessions",
            HostError::InvalidConfig(_) => "invalid_config",
            HostError::InvalidAction(_) => "invalid_action",
            HostError::Encode(_) => "encode_error",
            HostError::Settings(_) => "invalid_settings",
            HostError::Session(_) => "rejected",
            HostError::StoragePoisoned => "session_storage_error",
        }
    }

    /// Whether the caller can fix the problem by changing its request.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, HostError::Encode(_) | HostError::StoragePoisoned)
    }
}
