//! Session persistence adapter.
//!
//! Only durable bookkeeping is written: seen/dismissed notification ids,
//! rooms with an ongoing call and rooms whose alarm is blinking. Presence,
//! calls and pending invitations always start empty after a reload.

mod core;
mod storage;

pub use core::{
    DurableState, PersistedSession, PersistedState, Rehydration, rehydrate, rehydrate_value,
};
pub use storage::{FileStorage, MemoryStorage, SessionStorage};
