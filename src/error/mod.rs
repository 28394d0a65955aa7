//! Error module orchestrator.
//!
//! The session crate never propagates failures as panics; commands return
//! [`Result`] with a [`CommandOutcome`] so callers can tell an applied change
//! from a silent no-op.

mod types;

pub use types::{CommandOutcome, Result, SessionError};
