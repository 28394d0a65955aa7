use std::sync::{Arc, Mutex};

use crate::geometry::{Rect, Size};
use crate::metrics::SessionMetrics;

use super::grid::{DEFAULT_ASPECT_RATIO, GridLayout};

/// Default ratio for screen-share tiles (typical laptop panel).
pub const SCREEN_SHARE_ASPECT_RATIO: f64 = 16.0 / 10.0;

/// Identifier for one media feed on screen.
pub type TileId = String;

/// What a tile is rendering.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSource {
    Camera,
    ScreenShare,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tile {
    pub id: TileId,
    pub source: TileSource,
}

/// Keeps the conference grid in sync with container size and tile roster.
///
/// Every mutation re-solves the grid; [`AdaptiveGrid::take_changed`] reports
/// the new layout only when it actually differs from the last one handed out.
#[derive(Debug, Clone)]
pub struct AdaptiveGrid {
    container: Size,
    tiles: Vec<Tile>,
    camera_aspect: f64,
    screen_aspect: f64,
    current: GridLayout,
    is_dirty: bool,
    metrics: Option<Arc<Mutex<SessionMetrics>>>,
}

impl AdaptiveGrid {
    pub fn new(container: Size) -> Self {
        let mut grid = Self {
            container,
            tiles: Vec::new(),
            camera_aspect: DEFAULT_ASPECT_RATIO,
            screen_aspect: SCREEN_SHARE_ASPECT_RATIO,
            current: GridLayout::DEGENERATE,
            is_dirty: true,
            metrics: None,
        };
        grid.recompute();
        grid
    }

    pub fn with_aspect_ratios(mut self, camera: f64, screen_share: f64) -> Self {
        self.camera_aspect = camera;
        self.screen_aspect = screen_share;
        self.recompute();
        self
    }

    /// Counts every solve in the shared session metrics.
    pub fn with_metrics(mut self, metrics: Option<Arc<Mutex<SessionMetrics>>>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn resize(&mut self, container: Size) -> bool {
        if self.container == container {
            return false;
        }
        self.container = container;
        self.recompute()
    }

    /// Adds a tile, or updates its source if the id is already on screen.
    pub fn add_tile(&mut self, id: impl Into<TileId>, source: TileSource) -> bool {
        let id = id.into();
        if let Some(existing) = self.tiles.iter_mut().find(|tile| tile.id == id) {
            if existing.source == source {
                return false;
            }
            existing.source = source;
        } else {
            self.tiles.push(Tile { id, source });
        }
        self.recompute()
    }

    pub fn remove_tile(&mut self, id: &str) -> bool {
        let before = self.tiles.len();
        self.tiles.retain(|tile| tile.id != id);
        if self.tiles.len() == before {
            return false;
        }
        self.recompute()
    }

    pub fn set_source(&mut self, id: &str, source: TileSource) -> bool {
        match self.tiles.iter_mut().find(|tile| tile.id == id) {
            Some(tile) if tile.source != source => {
                tile.source = source;
                self.recompute()
            }
            _ => false,
        }
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn container(&self) -> Size {
        self.container
    }

    /// Screen shares dictate the ratio as soon as one is on screen.
    pub fn aspect_ratio(&self) -> f64 {
        if self
            .tiles
            .iter()
            .any(|tile| tile.source == TileSource::ScreenShare)
        {
            self.screen_aspect
        } else {
            self.camera_aspect
        }
    }

    pub fn layout(&self) -> GridLayout {
        self.current
    }

    pub fn tile_rects(&self) -> Vec<(TileId, Rect)> {
        let rects = self.current.tile_rects(self.container, self.tiles.len());
        self.tiles
            .iter()
            .zip(rects)
            .map(|(tile, rect)| (tile.id.clone(), rect))
            .collect()
    }

    pub fn has_changed(&self) -> bool {
        self.is_dirty
    }

    pub fn take_changed(&mut self) -> Option<GridLayout> {
        if !self.is_dirty {
            return None;
        }
        self.is_dirty = false;
        Some(self.current)
    }

    /// Returns true when the solved layout differs from the previous one.
    fn recompute(&mut self) -> bool {
        let next = GridLayout::solve(self.container, self.tiles.len(), self.aspect_ratio());
        if let Some(metrics) = self.metrics.as_ref() {
            if let Ok(mut guard) = metrics.lock() {
                guard.record_layout();
            }
        }
        if next == self.current {
            return false;
        }
        self.current = next;
        self.is_dirty = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wide() -> Size {
        Size::new(1200.0, 600.0)
    }

    #[test]
    fn empty_grid_is_degenerate_and_dirty() {
        let mut grid = AdaptiveGrid::new(wide());
        assert_eq!(grid.take_changed(), Some(GridLayout::DEGENERATE));
        assert_eq!(grid.take_changed(), None);
    }

    #[test]
    fn joining_tiles_reflows_the_grid() {
        let mut grid = AdaptiveGrid::new(wide());
        grid.take_changed();

        assert!(grid.add_tile("alice", TileSource::Camera));
        assert_eq!(grid.take_changed().map(|l| (l.cols, l.rows)), Some((1, 1)));

        assert!(grid.add_tile("bob", TileSource::Camera));
        assert_eq!(grid.take_changed().map(|l| (l.cols, l.rows)), Some((2, 1)));

        assert!(grid.remove_tile("alice"));
        assert_eq!(grid.layout().cols, 1);
        assert!(!grid.remove_tile("alice"));
    }

    #[test]
    fn re_adding_same_tile_is_noop() {
        let mut grid = AdaptiveGrid::new(wide());
        grid.add_tile("alice", TileSource::Camera);
        grid.take_changed();
        assert!(!grid.add_tile("alice", TileSource::Camera));
        assert!(!grid.has_changed());
        assert_eq!(grid.tiles().len(), 1);
    }

    #[test]
    fn screen_share_switches_aspect_ratio() {
        let mut grid = AdaptiveGrid::new(wide());
        grid.add_tile("alice", TileSource::Camera);
        assert!((grid.aspect_ratio() - DEFAULT_ASPECT_RATIO).abs() < f64::EPSILON);

        assert!(grid.set_source("alice", TileSource::ScreenShare));
        assert!((grid.aspect_ratio() - SCREEN_SHARE_ASPECT_RATIO).abs() < f64::EPSILON);
        let layout = grid.layout();
        assert!((layout.tile_width / layout.tile_height - 1.6).abs() < 1e-9);

        assert!(!grid.set_source("alice", TileSource::ScreenShare));
        assert!(!grid.set_source("ghost", TileSource::Camera));
    }

    #[test]
    fn resize_only_reports_real_changes() {
        let mut grid = AdaptiveGrid::new(wide());
        grid.add_tile("alice", TileSource::Camera);
        grid.add_tile("bob", TileSource::Camera);
        grid.take_changed();

        assert!(!grid.resize(wide()));
        assert!(grid.resize(Size::new(600.0, 1200.0)));
        assert_eq!(grid.take_changed().map(|l| (l.cols, l.rows)), Some((1, 2)));
    }

    #[test]
    fn solves_are_counted_when_metrics_attached() {
        let metrics = Arc::new(Mutex::new(SessionMetrics::new()));
        let mut grid = AdaptiveGrid::new(wide()).with_metrics(Some(Arc::clone(&metrics)));
        grid.add_tile("alice", TileSource::Camera);
        grid.add_tile("bob", TileSource::Camera);
        assert!(!grid.resize(wide()));
        grid.resize(Size::new(600.0, 1200.0));

        let snapshot = metrics.lock().unwrap().snapshot(std::time::Duration::ZERO);
        assert_eq!(snapshot.layouts_computed, 3);
    }

    #[test]
    fn tile_rects_follow_roster_order() {
        let mut grid = AdaptiveGrid::new(wide());
        grid.add_tile("alice", TileSource::Camera);
        grid.add_tile("bob", TileSource::Camera);
        let rects = grid.tile_rects();
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].0, "alice");
        assert!(rects[0].1.x < rects[1].1.x);
    }
}
