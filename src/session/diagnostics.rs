use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::logging::{LogEvent, LogLevel, Logger};
use crate::metrics::SessionMetrics;
use crate::time::{Timestamp, duration_ms, elapsed_ms};

use super::events::{SessionEvent, SessionObserver};

/// Logs session changes for observability/debugging.
pub struct SessionLogObserver {
    logger: Logger,
    level: LogLevel,
    target: String,
    log_presence: bool,
}

impl SessionLogObserver {
    pub fn new(logger: Logger) -> Self {
        Self {
            logger,
            level: LogLevel::Debug,
            target: "room_session::session".to_string(),
            log_presence: false,
        }
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Heartbeat churn is skipped unless enabled.
    pub fn log_presence(mut self, enabled: bool) -> Self {
        self.log_presence = enabled;
        self
    }
}

impl SessionObserver for SessionLogObserver {
    fn record(&self, event: &SessionEvent) {
        if event.change.is_presence() && !self.log_presence {
            return;
        }
        let mut log = LogEvent::with_fields(
            self.level,
            self.target.as_str(),
            event.change.as_str(),
            event.details.iter().cloned().collect(),
        );
        log.ts_ms = event.timestamp;
        let _ = self.logger.log_event(log);
    }
}

/// Emits metrics snapshots through a logger at most once per interval.
pub struct MetricsReporter {
    logger: Logger,
    metrics: Arc<Mutex<SessionMetrics>>,
    target: String,
    interval: Duration,
    started_at: Timestamp,
    last_emit: Option<Timestamp>,
}

impl MetricsReporter {
    pub fn new(logger: Logger, metrics: Arc<Mutex<SessionMetrics>>, started_at: Timestamp) -> Self {
        Self {
            logger,
            metrics,
            target: "room_session::metrics".to_string(),
            interval: Duration::from_secs(60),
            started_at,
            last_emit: None,
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = target.into();
        self
    }

    /// Returns true when a snapshot was written.
    pub fn maybe_emit(&mut self, now: Timestamp) -> bool {
        if self.interval.is_zero() {
            return false;
        }
        if let Some(last) = self.last_emit {
            if elapsed_ms(now, last) < duration_ms(self.interval) {
                return false;
            }
        }
        let Ok(guard) = self.metrics.lock() else {
            return false;
        };
        let uptime = Duration::from_millis(elapsed_ms(now, self.started_at));
        let event = guard.snapshot(uptime).to_log_event(&self.target);
        drop(guard);

        self.last_emit = Some(now);
        let _ = self.logger.log_event(event);
        true
    }
}
