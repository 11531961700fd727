use crate::session::SessionId;
use cardtable_engine::SessionEvent;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use tokio::sync::mpsc;

pub type EventSender = mpsc::Sender<SessionEvent>;
pub type EventReceiver = mpsc::Receiver<SessionEvent>;

const DEFAULT_EVENT_BUFFER: usize = 1000;

/// A live subscription to one session's events. Dropping it unsubscribes.
pub struct EventSubscription {
    bus: EventBus,
    session_id: SessionId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }

    /// Everything already queued, without waiting.
    pub fn drain(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.receiver.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.session_id, self.subscriber_id);
    }
}

/// Fans session events out to per-session subscribers.
///
/// Sends never block: a subscriber whose channel is full or closed is
/// dropped from the bus.
#[derive(Debug, Clone)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug)]
struct EventBusInner {
    subscribers: RwLock<HashMap<SessionId, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
    buffer: usize,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_buffer(DEFAULT_EVENT_BUFFER)
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            inner: Arc::new(EventBusInner {
                subscribers: RwLock::new(HashMap::new()),
                next_id: AtomicUsize::new(0),
                buffer: buffer.max(1),
            }),
        }
    }

    pub fn subscribe(&self, session_id: SessionId) -> EventSubscription {
        let (subscriber_id, receiver) = self.subscribe_raw(session_id.clone());
        EventSubscription {
            bus: self.clone(),
            session_id,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, session_id: SessionId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(self.inner.buffer);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.entry(session_id.clone()).or_default().push((id, tx));

        tracing::info!(
            session_id = %session_id,
            subscriber_id = id,
            "subscribed to session events"
        );

        (id, rx)
    }

    pub fn broadcast(&self, session_id: &str, event: SessionEvent) {
        tracing::debug!(
            session_id = %session_id,
            event = event.name(),
            "broadcasting session event"
        );

        let subscribers = {
            let guard = self
                .inner
                .subscribers
                .read()
                .unwrap_or_else(PoisonError::into_inner);
            guard.get(session_id).cloned()
        };

        let Some(list) = subscribers else {
            tracing::trace!(session_id = %session_id, "no subscribers for session");
            return;
        };

        let mut failed = Vec::new();
        for (id, sender) in list {
            if let Err(e) = sender.try_send(event.clone()) {
                tracing::warn!(
                    session_id = %session_id,
                    subscriber_id = id,
                    error = %e,
                    "dropping subscriber"
                );
                failed.push(id);
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(session_id, &failed);
        }
    }

    pub fn unsubscribe(&self, session_id: &str, subscriber_id: usize) {
        self.remove_subscribers(session_id, &[subscriber_id]);
    }

    pub fn drop_session(&self, session_id: &str) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        guard.remove(session_id);
    }

    pub fn subscriber_count(&self) -> usize {
        let guard = self
            .inner
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        guard.values().map(|list| list.len()).sum()
    }

    fn remove_subscribers(&self, session_id: &str, ids: &[usize]) {
        let mut guard = self
            .inner
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if let Some(list) = guard.get_mut(session_id) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardtable_engine::events::FinalSummary;

    fn ended(session_id: &str) -> SessionEvent {
        SessionEvent::SessionEnded {
            summary: FinalSummary {
                session_id: session_id.to_string(),
                session_name: "t".into(),
                rounds_played: 0,
                winner: None,
                standings: Vec::new(),
            },
        }
    }

    #[test]
    fn subscription_drop_unsubscribes() {
        let bus = EventBus::new();
        {
            let _sub = bus.subscribe("s".to_string());
            assert_eq!(bus.subscriber_count(), 1);
        }
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn broadcast_reaches_only_that_session() {
        let bus = EventBus::new();
        let mut sub1 = bus.subscribe("s".to_string());
        let mut sub2 = bus.subscribe("s".to_string());
        let mut other = bus.subscribe("t".to_string());

        bus.broadcast("s", ended("s"));

        assert_eq!(sub1.drain().len(), 1);
        assert!(matches!(
            sub2.receiver.try_recv(),
            Ok(SessionEvent::SessionEnded { .. })
        ));
        assert!(other.drain().is_empty());
    }

    #[test]
    fn full_or_closed_subscribers_are_pruned() {
        let bus = EventBus::with_buffer(1);
        let _slow = bus.subscribe("s".to_string());
        let (id, rx) = bus.subscribe_raw("s".to_string());
        drop(rx);
        bus.broadcast("s", ended("s"));
        assert_eq!(bus.subscriber_count(), 1);
        bus.broadcast("s", ended("s"));
        assert_eq!(bus.subscriber_count(), 0);
        bus.unsubscribe("s", id);
    }
}
