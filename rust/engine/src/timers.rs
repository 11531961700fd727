//! Pending requests and the timer commands that guard them.
//!
//! Machines never own clocks. Opening a request queues a
//! [`TimerCommand::Schedule`]; closing it queues a [`TimerCommand::Cancel`].
//! The host runs the timers and, when one fires, feeds an expire action back
//! carrying the request id. Ids never repeat within a session, so a timer that
//! outlived its request matches nothing and is ignored.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::player::PlayerId;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    SideShow,
    Show,
    ForceShow,
    Declaration,
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestKind::SideShow => "side show",
            RequestKind::Show => "show",
            RequestKind::ForceShow => "force show",
            RequestKind::Declaration => "declaration",
        };
        f.write_str(s)
    }
}

/// Identifies one timer: the request kind plus the id of the request it guards.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TimerKey {
    pub kind: RequestKind,
    pub request_id: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum TimerCommand {
    Schedule { key: TimerKey, after: Duration },
    Cancel { key: TimerKey },
}

impl TimerCommand {
    pub fn key(&self) -> TimerKey {
        match self {
            TimerCommand::Schedule { key, .. } | TimerCommand::Cancel { key } => *key,
        }
    }
}

/// An open request waiting on a resolution from outside the machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingRequest {
    pub id: u64,
    pub kind: RequestKind,
    pub requester: PlayerId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<PlayerId>,
    pub opened_at: DateTime<Utc>,
}

impl PendingRequest {
    pub fn involves(&self, player_id: &str) -> bool {
        self.requester == player_id || self.target.as_deref() == Some(player_id)
    }

    pub fn timer_key(&self) -> TimerKey {
        TimerKey {
            kind: self.kind,
            request_id: self.id,
        }
    }
}

/// At most one open request per kind.
#[derive(Debug, Clone)]
pub(crate) struct RequestBook {
    next_id: u64,
    timeout: Duration,
    open: BTreeMap<RequestKind, PendingRequest>,
    commands: Vec<TimerCommand>,
}

impl RequestBook {
    pub(crate) fn new(timeout: Duration) -> Self {
        Self {
            next_id: 1,
            timeout,
            open: BTreeMap::new(),
            commands: Vec::new(),
        }
    }

    pub(crate) fn get(&self, kind: RequestKind) -> Option<&PendingRequest> {
        self.open.get(&kind)
    }

    /// Any open request, lowest kind first.
    pub(crate) fn first(&self) -> Option<&PendingRequest> {
        self.open.values().next()
    }

    pub(crate) fn pending(&self) -> Vec<PendingRequest> {
        self.open.values().cloned().collect()
    }

    pub(crate) fn ensure_free(&self, kind: RequestKind) -> Result<(), SessionError> {
        if self.open.contains_key(&kind) {
            return Err(SessionError::RequestPending(kind));
        }
        Ok(())
    }

    pub(crate) fn open(
        &mut self,
        kind: RequestKind,
        requester: &str,
        target: Option<&str>,
    ) -> Result<&PendingRequest, SessionError> {
        self.ensure_free(kind)?;
        let request = PendingRequest {
            id: self.next_id,
            kind,
            requester: requester.to_string(),
            target: target.map(str::to_string),
            opened_at: Utc::now(),
        };
        self.next_id += 1;
        self.commands.push(TimerCommand::Schedule {
            key: request.timer_key(),
            after: self.timeout,
        });
        Ok(self.open.entry(kind).or_insert(request))
    }

    pub(crate) fn close(&mut self, kind: RequestKind) -> Option<PendingRequest> {
        let request = self.open.remove(&kind)?;
        self.commands.push(TimerCommand::Cancel {
            key: request.timer_key(),
        });
        Some(request)
    }

    /// Closes the request only when it is still the one the timer was armed for.
    pub(crate) fn expire(&mut self, kind: RequestKind, request_id: u64) -> Option<PendingRequest> {
        match self.open.get(&kind) {
            Some(r) if r.id == request_id => self.open.remove(&kind),
            _ => None,
        }
    }

    pub(crate) fn clear(&mut self) {
        let kinds: Vec<RequestKind> = self.open.keys().copied().collect();
        for kind in kinds {
            self.close(kind);
        }
    }

    pub(crate) fn drain_commands(&mut self) -> Vec<TimerCommand> {
        std::mem::take(&mut self.commands)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> RequestBook {
        RequestBook::new(Duration::from_secs(60))
    }

    #[test]
    fn open_schedules_and_close_cancels() {
        let mut b = book();
        let id = b.open(RequestKind::SideShow, "p1", Some("p2")).unwrap().id;
        assert!(b.close(RequestKind::SideShow).is_some());
        let cmds = b.drain_commands();
        let key = TimerKey {
            kind: RequestKind::SideShow,
            request_id: id,
        };
        assert_eq!(
            cmds,
            vec![
                TimerCommand::Schedule {
                    key,
                    after: Duration::from_secs(60)
                },
                TimerCommand::Cancel { key },
            ]
        );
        assert!(b.drain_commands().is_empty());
    }

    #[test]
    fn second_request_of_same_kind_is_rejected() {
        let mut b = book();
        b.open(RequestKind::Show, "p1", None).unwrap();
        assert_eq!(
            b.open(RequestKind::Show, "p2", None).unwrap_err(),
            SessionError::RequestPending(RequestKind::Show)
        );
    }

    #[test]
    fn stale_expiry_is_ignored() {
        let mut b = book();
        let first = b.open(RequestKind::SideShow, "p1", Some("p2")).unwrap().id;
        b.close(RequestKind::SideShow);
        let second = b.open(RequestKind::SideShow, "p3", Some("p2")).unwrap().id;
        assert_ne!(first, second);
        assert!(b.expire(RequestKind::SideShow, first).is_none());
        assert!(b.get(RequestKind::SideShow).is_some());
        assert!(b.expire(RequestKind::SideShow, second).is_some());
        assert!(b.first().is_none());
    }

    #[test]
    fn involves_matches_requester_and_target() {
        let mut b = book();
        let r = b.open(RequestKind::ForceShow, "a", Some("b")).unwrap().clone();
        assert!(r.involves("a"));
        assert!(r.involves("b"));
        assert!(!r.involves("c"));
    }
}
