//! Peer presence and call-session coordination.
//!
//! The crate keeps the client-side state of a chat application that supports
//! group calls: who is in which room, which call invitations are ringing,
//! which calls are live and how their video tiles are laid out. Transport,
//! media and rendering are collaborators reached through small traits
//! ([`LinkBuilder`], [`SessionStorage`], [`SessionObserver`]) or fed in as
//! [`SignalEvent`]s.
//!
//! [`SessionStore`] is the entry point. The layout engine is pure and can be
//! used on its own.

pub mod calls;
pub mod config;
pub mod error;
pub mod geometry;
pub mod ids;
pub mod invitations;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod persistence;
pub mod presence;
pub mod session;
pub mod signals;
pub mod time;

pub use calls::{ActiveCall, BaseUrlLinkBuilder, CallRegistry, LinkBuilder};
pub use config::{DEFAULT_PRESENCE_TIMEOUT, SessionConfig};
pub use error::{CommandOutcome, Result, SessionError};
pub use geometry::{Rect, Size};
pub use ids::IdentifierSet;
pub use invitations::{
    CallInvitation, DEFAULT_INVITATION_TTL, InvitationId, InvitationManager, InvitationPatch,
    InvitationStatus,
};
pub use layout::{
    AdaptiveGrid, DEFAULT_ASPECT_RATIO, GridLayout, Tile, TileId, TileSource, compute_layout,
};
pub use logging::{FileSink, LogEvent, LogFields, LogLevel, LogSink, Logger, LoggingError, MemorySink};
pub use metrics::{MetricSnapshot, SessionMetrics};
pub use persistence::{FileStorage, MemoryStorage, PersistedSession, SessionStorage};
pub use presence::{PresenceLedger, RoomId, RoomPresence, UserId};
pub use session::{
    BufferedObserver, SessionChange, SessionEvent, SessionLogObserver, SessionObserver,
    SessionStore, SubscriptionId, TickReport,
};
pub use signals::SignalEvent;
pub use time::Timestamp;
