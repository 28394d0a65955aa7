//! Change notifications emitted by [`super::SessionStore`].
//!
//! Every applied command produces one [`SessionEvent`]: a change kind plus
//! structured details. Observers receive events synchronously, in the order
//! commands were applied, right after the mutation finished.

use std::sync::mpsc::Sender;
use std::sync::{Arc, Mutex};

use serde_json::Value;

use crate::time::{Timestamp, now_ms};

/// Distinct kinds of state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionChange {
    PresenceChanged,
    MyPresenceChanged,
    PresenceExpired,
    InvitationAdded,
    InvitationUpdated,
    InvitationRemoved,
    InvitationsExpired,
    SeenStateChanged,
    BlinkingRoomsChanged,
    CallStarted,
    CallEnded,
    ParticipantsChanged,
    CallMinimized,
    CurrentCallChanged,
    ShareableLinkGenerated,
    ActiveCallRoomsChanged,
    SessionReset,
}

impl SessionChange {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionChange::PresenceChanged => "presence_changed",
            SessionChange::MyPresenceChanged => "my_presence_changed",
            SessionChange::PresenceExpired => "presence_expired",
            SessionChange::InvitationAdded => "invitation_added",
            SessionChange::InvitationUpdated => "invitation_updated",
            SessionChange::InvitationRemoved => "invitation_removed",
            SessionChange::InvitationsExpired => "invitations_expired",
            SessionChange::SeenStateChanged => "seen_state_changed",
            SessionChange::BlinkingRoomsChanged => "blinking_rooms_changed",
            SessionChange::CallStarted => "call_started",
            SessionChange::CallEnded => "call_ended",
            SessionChange::ParticipantsChanged => "participants_changed",
            SessionChange::CallMinimized => "call_minimized",
            SessionChange::CurrentCallChanged => "current_call_changed",
            SessionChange::ShareableLinkGenerated => "shareable_link_generated",
            SessionChange::ActiveCallRoomsChanged => "active_call_rooms_changed",
            SessionChange::SessionReset => "session_reset",
        }
    }

    /// Heartbeat-driven changes that a log observer usually skips.
    pub fn is_presence(self) -> bool {
        matches!(
            self,
            SessionChange::PresenceChanged
                | SessionChange::MyPresenceChanged
                | SessionChange::PresenceExpired
        )
    }
}

/// Structured change record.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub timestamp: Timestamp,
    pub change: SessionChange,
    pub details: Vec<(String, Value)>,
}

impl SessionEvent {
    fn new(change: SessionChange) -> Self {
        Self {
            timestamp: now_ms(),
            change,
            details: Vec::new(),
        }
    }

    pub fn detail(&self, key: &str) -> Option<&Value> {
        self.details
            .iter()
            .find(|(name, _)| name == key)
            .map(|(_, value)| value)
    }
}

/// Builder helper to append fields ergonomically.
pub struct SessionEventBuilder {
    event: SessionEvent,
}

impl SessionEventBuilder {
    pub fn new(change: SessionChange) -> Self {
        Self {
            event: SessionEvent::new(change),
        }
    }

    pub fn at(&mut self, timestamp: Timestamp) -> &mut Self {
        self.event.timestamp = timestamp;
        self
    }

    pub fn detail(&mut self, key: impl Into<String>, value: Value) -> &mut Self {
        self.event.details.push((key.into(), value));
        self
    }

    pub fn details(&mut self, details: impl IntoIterator<Item = (String, Value)>) -> &mut Self {
        self.event.details.extend(details);
        self
    }

    pub fn finish(self) -> SessionEvent {
        self.event
    }
}

/// Handle returned by [`super::SessionStore::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(pub(crate) u64);

/// Trait implemented by anything that wants to hear about state changes.
pub trait SessionObserver: Send + Sync {
    fn record(&self, event: &SessionEvent);
}

/// No-op observer.
#[derive(Debug, Default)]
pub struct NullObserver;

impl SessionObserver for NullObserver {
    fn record(&self, _event: &SessionEvent) {}
}

/// Keeps every event it sees. Clones share the buffer.
#[derive(Debug, Clone, Default)]
pub struct BufferedObserver {
    events: Arc<Mutex<Vec<SessionEvent>>>,
}

impl BufferedObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn changes(&self) -> Vec<SessionChange> {
        self.events().into_iter().map(|event| event.change).collect()
    }

    pub fn drain(&self) -> Vec<SessionEvent> {
        self.events
            .lock()
            .map(|mut guard| std::mem::take(&mut *guard))
            .unwrap_or_default()
    }
}

impl SessionObserver for BufferedObserver {
    fn record(&self, event: &SessionEvent) {
        if let Ok(mut guard) = self.events.lock() {
            guard.push(event.clone());
        }
    }
}

/// Forwards events into a channel; a dropped receiver is ignored.
pub struct ChannelObserver {
    sender: Sender<SessionEvent>,
}

impl ChannelObserver {
    pub fn new(sender: Sender<SessionEvent>) -> Self {
        Self { sender }
    }
}

impl SessionObserver for ChannelObserver {
    fn record(&self, event: &SessionEvent) {
        let _ = self.sender.send(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::mpsc;

    #[test]
    fn builder_collects_details() {
        let mut builder = SessionEventBuilder::new(SessionChange::CallStarted);
        builder.at(42).detail("room_id", json!("r1"));
        let event = builder.finish();
        assert_eq!(event.timestamp, 42);
        assert_eq!(event.detail("room_id"), Some(&json!("r1")));
        assert_eq!(event.detail("missing"), None);
        assert_eq!(event.change.as_str(), "call_started");
    }

    #[test]
    fn buffered_observer_drains() {
        let observer = BufferedObserver::new();
        let shared = observer.clone();
        observer.record(&SessionEventBuilder::new(SessionChange::CallEnded).finish());
        assert_eq!(shared.changes(), vec![SessionChange::CallEnded]);
        assert_eq!(shared.drain().len(), 1);
        assert!(observer.events().is_empty());
    }

    #[test]
    fn channel_observer_survives_dropped_receiver() {
        let (tx, rx) = mpsc::channel();
        let observer = ChannelObserver::new(tx);
        observer.record(&SessionEventBuilder::new(SessionChange::SessionReset).finish());
        assert_eq!(rx.recv().unwrap().change, SessionChange::SessionReset);
        drop(rx);
        observer.record(&SessionEventBuilder::new(SessionChange::SessionReset).finish());
    }
}
