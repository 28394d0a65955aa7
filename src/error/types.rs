use thiserror::Error;

/// Unified result type for the session crate.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors surfaced by session commands and collaborators.
///
/// None of these ever escape as a panic. Commands hand them back so callers can
/// inspect the reason, and the store logs them before returning.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("room id must not be empty")]
    InvalidRoomId,
    #[error("user id must not be empty")]
    InvalidUserId,
    #[error("participant `{user_id}` listed twice for room `{room_id}`")]
    DuplicateParticipant { room_id: String, user_id: String },
    #[error("join link builder failed: {0}")]
    LinkBuilder(String),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// What a command did to the state it was pointed at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// State changed; observers are notified and the snapshot is persisted.
    Applied,
    /// Unknown id, idempotent repeat or identical payload. Nothing changed.
    Unchanged,
}

impl CommandOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, CommandOutcome::Applied)
    }

    pub fn from_changed(changed: bool) -> Self {
        if changed {
            CommandOutcome::Applied
        } else {
            CommandOutcome::Unchanged
        }
    }
}
