//! Layout module orchestrator.
//!
//! `grid` holds the pure tile-grid solver; the private `core` module wraps it
//! in [`AdaptiveGrid`], which tracks container size and the on-screen roster
//! and only reports layouts that changed.

mod core;
pub mod grid;

pub use core::{AdaptiveGrid, SCREEN_SHARE_ASPECT_RATIO, Tile, TileId, TileSource};
pub use grid::{DEFAULT_ASPECT_RATIO, GridLayout, compute_layout};
