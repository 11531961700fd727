use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Number of log lines carried in public state.
pub const PUBLIC_LOG_TAIL: usize = 20;

/// One human-readable line in a session's history.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// Monotonic within the session, starting at 1.
    pub seq: u64,
    /// Round the entry belongs to.
    pub round: u32,
    /// RFC3339 timestamp, second precision.
    pub at: String,
    pub message: String,
}

impl LogEntry {
    pub fn timestamp(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.at)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }
}

/// Append-only session history. Only accepted actions write to it.
#[derive(Debug, Clone, Default)]
pub struct SessionLog {
    entries: Vec<LogEntry>,
    seq: u64,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, round: u32, message: impl Into<String>) -> &LogEntry {
        self.seq += 1;
        let entry = LogEntry {
            seq: self.seq,
            round,
            at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
            message: message.into(),
        };
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Last `n` entries in order.
    pub fn tail(&self, n: usize) -> Vec<LogEntry> {
        let start = self.entries.len().saturating_sub(n);
        self.entries[start..].to_vec()
    }
}
