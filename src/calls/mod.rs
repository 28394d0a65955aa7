//! Active call registry.
//!
//! Tracks the live call per room, the single foreground ("current") call and
//! the join links handed out for sharing. Link construction is delegated to a
//! [`LinkBuilder`] supplied by the embedding application.

mod core;
mod links;

pub use core::{ActiveCall, CallRegistry};
pub use links::{BaseUrlLinkBuilder, LinkBuilder, fallback_join_url};
