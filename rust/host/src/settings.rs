use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Host-wide settings applied to every session it creates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HostSettings {
    /// Timeout for side-show, show and declaration requests when the game
    /// config does not name one.
    pub default_request_timeout_secs: u64,
    /// Upper bound on concurrently hosted sessions.
    pub max_sessions: usize,
    /// Per-subscriber channel capacity; slow subscribers past this are dropped.
    pub event_buffer: usize,
}

impl Default for HostSettings {
    fn default() -> Self {
        Self {
            default_request_timeout_secs: cardtable_engine::config::DEFAULT_REQUEST_TIMEOUT_SECS,
            max_sessions: 256,
            event_buffer: 1000,
        }
    }
}

impl HostSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_request_timeout_secs == 0 {
            return Err(SettingsError::InvalidValue(
                "default_request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_sessions == 0 {
            return Err(SettingsError::InvalidValue(
                "max_sessions must be greater than 0".to_string(),
            ));
        }

        if self.event_buffer == 0 {
            return Err(SettingsError::InvalidValue(
                "event_buffer must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingsError {
    #[error("Invalid settings value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_settings_are_valid() {
        let settings = HostSettings::default();
        assert!(settings.validate().is_ok());
        assert_eq!(settings.default_request_timeout_secs, 60);
    }

    #[test]
    fn zero_values_are_rejected() {
        let settings = HostSettings {
            max_sessions: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(SettingsError::InvalidValue(msg)) if msg.contains("max_sessions")
        ));

        let settings = HostSettings {
            event_buffer: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn partial_json_fills_defaults() {
        let settings: HostSettings = serde_json::from_str(r#"{"max_sessions": 4}"#).unwrap();
        assert_eq!(settings.max_sessions, 4);
        assert_eq!(settings.event_buffer, 1000);
    }
}
