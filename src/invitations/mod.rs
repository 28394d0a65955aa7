//! Call invitation lifecycle: `pending -> accepted | rejected | expired`.
//!
//! Expiry is not reactive. Callers run [`InvitationManager::sweep_expired`]
//! on their own timer; consumers that look at an invitation in between use
//! [`CallInvitation::is_expired`].

mod core;

pub use core::{
    CallInvitation, DEFAULT_INVITATION_TTL, InvitationId, InvitationManager, InvitationPatch,
    InvitationStatus,
};
