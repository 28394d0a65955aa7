use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::invitations::DEFAULT_INVITATION_TTL;
use crate::logging::Logger;
use crate::metrics::SessionMetrics;

/// Presence records older than this are pruned by the sweep.
pub const DEFAULT_PRESENCE_TIMEOUT: Duration = Duration::from_secs(30);

/// Schema version written into the persisted blob.
pub const PERSIST_VERSION: u32 = 1;

pub const DEFAULT_JOIN_BASE_URL: &str = "https://localhost/join";

/// Configuration knobs for a [`crate::SessionStore`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Heartbeat age at which a presence record is dropped.
    pub presence_timeout: Duration,
    /// Age at which a pending invitation counts as expired.
    pub invitation_ttl: Duration,
    /// Base for join links built locally when the link builder fails.
    pub join_base_url: String,
    /// Version stamped on persisted snapshots.
    pub persist_version: u32,
    /// Optional structured logger shared by every component.
    pub logger: Option<Logger>,
    /// Counters updated as commands apply.
    pub metrics: Option<Arc<Mutex<SessionMetrics>>>,
    /// Minimum gap between metrics snapshots emitted from `tick`. Zero disables them.
    pub metrics_interval: Duration,
    /// Target field used when emitting metrics snapshots.
    pub metrics_target: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            presence_timeout: DEFAULT_PRESENCE_TIMEOUT,
            invitation_ttl: DEFAULT_INVITATION_TTL,
            join_base_url: DEFAULT_JOIN_BASE_URL.to_string(),
            persist_version: PERSIST_VERSION,
            logger: None,
            metrics: None,
            metrics_interval: Duration::from_secs(60),
            metrics_target: "room_session::metrics".to_string(),
        }
    }
}

impl SessionConfig {
    pub fn with_presence_timeout(mut self, timeout: Duration) -> Self {
        self.presence_timeout = timeout;
        self
    }

    pub fn with_invitation_ttl(mut self, ttl: Duration) -> Self {
        self.invitation_ttl = ttl;
        self
    }

    pub fn with_join_base_url(mut self, base: impl Into<String>) -> Self {
        self.join_base_url = base.into();
        self
    }

    pub fn with_logger(mut self, logger: Logger) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn with_metrics_interval(mut self, interval: Duration) -> Self {
        self.metrics_interval = interval;
        self
    }

    /// Enable metrics collection if it has not already been configured.
    pub fn enable_metrics(&mut self) {
        if self.metrics.is_none() {
            self.metrics = Some(Arc::new(Mutex::new(SessionMetrics::new())));
        }
    }

    pub fn disable_metrics(&mut self) {
        self.metrics = None;
    }

    /// Access the shared metrics handle if metrics are enabled.
    pub fn metrics_handle(&self) -> Option<Arc<Mutex<SessionMetrics>>> {
        self.metrics.as_ref().map(Arc::clone)
    }
}
