//! Session host for the card-table engine.
//!
//! Maps game codes to session constructors, serializes actions per session,
//! runs request timers on tokio and fans session events out to subscribers.

pub mod errors;
pub mod events;
pub mod logging;
pub mod registry;
pub mod session;
pub mod settings;

pub use errors::HostError;
pub use events::{EventBus, EventSubscription};
pub use logging::{init_logging, LogRecord, TestLogSubscriber};
pub use registry::{GameMachine, GameRegistry, SessionSpec, RUMMY, TEEN_PATTI};
pub use session::{HostedSession, SessionId, SessionInfo, SessionManager};
pub use settings::{HostSettings, SettingsError};
