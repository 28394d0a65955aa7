use crate::logging::{LogEvent, LogFields, LogLevel};
use serde_json::json;
use std::time::Duration;

#[derive(Debug, Default, Clone)]
pub struct SessionMetrics {
    commands_applied: u64,
    invitations_received: u64,
    invitations_expired: u64,
    calls_started: u64,
    calls_ended: u64,
    presence_pruned: u64,
    persist_writes: u64,
    persist_failures: u64,
    command_failures: u64,
    layouts_computed: u64,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_command(&mut self) {
        self.commands_applied = self.commands_applied.saturating_add(1);
    }

    pub fn record_command_failure(&mut self) {
        self.command_failures = self.command_failures.saturating_add(1);
    }

    pub fn record_invitation(&mut self) {
        self.invitations_received = self.invitations_received.saturating_add(1);
    }

    pub fn record_expired_invitations(&mut self, count: usize) {
        self.invitations_expired = self.invitations_expired.saturating_add(count as u64);
    }

    pub fn record_call_started(&mut self) {
        self.calls_started = self.calls_started.saturating_add(1);
    }

    pub fn record_call_ended(&mut self) {
        self.calls_ended = self.calls_ended.saturating_add(1);
    }

    pub fn record_presence_pruned(&mut self, count: usize) {
        self.presence_pruned = self.presence_pruned.saturating_add(count as u64);
    }

    pub fn record_layout(&mut self) {
        self.layouts_computed = self.layouts_computed.saturating_add(1);
    }

    pub fn record_persist(&mut self, ok: bool) {
        if ok {
            self.persist_writes = self.persist_writes.saturating_add(1);
        } else {
            self.persist_failures = self.persist_failures.saturating_add(1);
        }
    }

    pub fn snapshot(&self, uptime: Duration) -> MetricSnapshot {
        MetricSnapshot {
            uptime_ms: uptime.as_millis() as u64,
            commands_applied: self.commands_applied,
            command_failures: self.command_failures,
            invitations_received: self.invitations_received,
            invitations_expired: self.invitations_expired,
            calls_started: self.calls_started,
            calls_ended: self.calls_ended,
            presence_pruned: self.presence_pruned,
            persist_writes: self.persist_writes,
            persist_failures: self.persist_failures,
            layouts_computed: self.layouts_computed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSnapshot {
    pub uptime_ms: u64,
    pub commands_applied: u64,
    pub command_failures: u64,
    pub invitations_received: u64,
    pub invitations_expired: u64,
    pub calls_started: u64,
    pub calls_ended: u64,
    pub presence_pruned: u64,
    pub persist_writes: u64,
    pub persist_failures: u64,
    pub layouts_computed: u64,
}

impl MetricSnapshot {
    pub fn to_log_event(&self, target: &str) -> LogEvent {
        LogEvent::with_fields(LogLevel::Info, target, "session_metrics", self.as_fields())
    }

    pub fn as_fields(&self) -> LogFields {
        let mut map = LogFields::new();
        map.insert("uptime_ms".to_string(), json!(self.uptime_ms));
        map.insert("commands_applied".to_string(), json!(self.commands_applied));
        map.insert("command_failures".to_string(), json!(self.command_failures));
        map.insert(
            "invitations_received".to_string(),
            json!(self.invitations_received),
        );
        map.insert(
            "invitations_expired".to_string(),
            json!(self.invitations_expired),
        );
        map.insert("calls_started".to_string(), json!(self.calls_started));
        map.insert("calls_ended".to_string(), json!(self.calls_ended));
        map.insert("presence_pruned".to_string(), json!(self.presence_pruned));
        map.insert("persist_writes".to_string(), json!(self.persist_writes));
        map.insert("persist_failures".to_string(), json!(self.persist_failures));
        map.insert("layouts_computed".to_string(), json!(self.layouts_computed));
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let mut metrics = SessionMetrics::new();
        metrics.record_call_started();
        metrics.record_expired_invitations(3);
        metrics.record_persist(true);
        metrics.record_persist(false);
        metrics.record_layout();

        let snapshot = metrics.snapshot(Duration::from_millis(1500));
        assert_eq!(snapshot.uptime_ms, 1500);
        assert_eq!(snapshot.calls_started, 1);
        assert_eq!(snapshot.invitations_expired, 3);
        assert_eq!(snapshot.persist_writes, 1);
        assert_eq!(snapshot.persist_failures, 1);
        assert_eq!(snapshot.layouts_computed, 1);

        let event = snapshot.to_log_event("room_session::metrics");
        assert_eq!(event.message, "session_metrics");
        assert_eq!(event.field("calls_started"), Some(&json!(1)));
        assert_eq!(event.field("layouts_computed"), Some(&json!(1)));
    }
}
