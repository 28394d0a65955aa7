//! Presence ledger: who is connected to which room.
//!
//! Records are refreshed by heartbeats delivered from the messaging layer and
//! pruned by [`PresenceLedger::sweep_expired`], which the caller drives from
//! its own timer.

mod core;

pub use core::{PresenceLedger, RoomId, RoomPresence, UserId};
