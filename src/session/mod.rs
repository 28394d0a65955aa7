//! Session module orchestrator.
//!
//! [`SessionStore`] owns the presence ledger, invitation manager and call
//! registry and is the only place they are mutated from. `events` defines the
//! change notifications it emits; `diagnostics` turns those notifications and
//! the metrics counters into log lines.

pub mod diagnostics;
pub mod events;
mod store;

pub use diagnostics::{MetricsReporter, SessionLogObserver};
pub use events::{
    BufferedObserver, ChannelObserver, NullObserver, SessionChange, SessionEvent,
    SessionEventBuilder, SessionObserver, SubscriptionId,
};
pub use store::{SessionStore, TickReport};
