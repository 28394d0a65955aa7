//! Adaptive tile grid - sizes N equally shaped media tiles inside a container
//!
//! The solver walks every candidate column count `c` in `1..=tile_count`,
//! derives `rows = ceil(tile_count / c)` and fits a tile of the requested aspect
//! ratio inside the resulting cell. The candidate with the largest tile area
//! wins. Ties keep the first (smallest) column count because the comparison is
//! strictly greater-than.
//!
//! Two-party calls are not special-cased: a wide container yields `2x1` and a
//! tall one `1x2` straight from the area rule.
//!
//! # Example
//! ```
//! use room_session::layout::grid::compute_layout;
//!
//! let layout = compute_layout(1200.0, 600.0, 2, 16.0 / 9.0);
//! assert_eq!((layout.cols, layout.rows), (2, 1));
//! ```

use crate::geometry::{Rect, Size};

/// Aspect ratio used when the caller passes a non-positive or non-finite one.
pub const DEFAULT_ASPECT_RATIO: f64 = 16.0 / 9.0;

/// Solved grid for a given container, tile count and aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridLayout {
    pub cols: usize,
    pub rows: usize,
    pub tile_width: f64,
    pub tile_height: f64,
}

impl GridLayout {
    /// Layout returned for empty or zero-sized containers.
    pub const DEGENERATE: GridLayout = GridLayout {
        cols: 1,
        rows: 1,
        tile_width: 0.0,
        tile_height: 0.0,
    };

    pub fn solve(container: Size, tile_count: usize, aspect_ratio: f64) -> Self {
        compute_layout(container.width, container.height, tile_count, aspect_ratio)
    }

    pub fn capacity(&self) -> usize {
        self.cols * self.rows
    }

    pub fn tile_area(&self) -> f64 {
        self.tile_width * self.tile_height
    }

    /// Places `tile_count` tiles row-major inside `container`.
    ///
    /// Each tile is centred in its cell. A partially filled last row is centred
    /// horizontally as a block.
    pub fn tile_rects(&self, container: Size, tile_count: usize) -> Vec<Rect> {
        if tile_count == 0 || container.is_degenerate() {
            return Vec::new();
        }

        let cols = self.cols.max(1);
        let rows = self.rows.max(1);
        let cell_width = container.width / cols as f64;
        let cell_height = container.height / rows as f64;
        let inset_x = (cell_width - self.tile_width).max(0.0) / 2.0;
        let inset_y = (cell_height - self.tile_height).max(0.0) / 2.0;

        let count = tile_count.min(cols * rows);
        let last_row = (count - 1) / cols;
        let last_row_len = count - last_row * cols;

        (0..count)
            .map(|index| {
                let row = index / cols;
                let col = index % cols;
                let row_offset = if row == last_row && last_row_len < cols {
                    (cols - last_row_len) as f64 * cell_width / 2.0
                } else {
                    0.0
                };
                Rect::new(
                    row_offset + col as f64 * cell_width + inset_x,
                    row as f64 * cell_height + inset_y,
                    self.tile_width,
                    self.tile_height,
                )
            })
            .collect()
    }
}

/// Computes the grid that maximises tile area.
///
/// Degenerates to [`GridLayout::DEGENERATE`] when either container dimension is
/// not positive or `tile_count` is zero.
pub fn compute_layout(
    container_width: f64,
    container_height: f64,
    tile_count: usize,
    aspect_ratio: f64,
) -> GridLayout {
    let container = Size::new(container_width, container_height);
    if tile_count == 0 || container.is_degenerate() {
        return GridLayout::DEGENERATE;
    }

    let aspect_ratio = if aspect_ratio.is_finite() && aspect_ratio > 0.0 {
        aspect_ratio
    } else {
        DEFAULT_ASPECT_RATIO
    };

    let mut best = GridLayout {
        cols: 1,
        rows: tile_count,
        tile_width: 0.0,
        tile_height: 0.0,
    };
    let mut best_area = f64::NEG_INFINITY;

    for cols in 1..=tile_count {
        let rows = tile_count.div_ceil(cols);
        let (tile_width, tile_height) = fit_tile(
            container_width / cols as f64,
            container_height / rows as f64,
            aspect_ratio,
        );
        let area = tile_width * tile_height;
        if area > best_area {
            best_area = area;
            best = GridLayout {
                cols,
                rows,
                tile_width,
                tile_height,
            };
        }
    }

    best.cols = best.cols.clamp(1, tile_count);
    best
}

/// Largest `aspect_ratio` rectangle that fits in a `cell_width x cell_height` cell.
fn fit_tile(cell_width: f64, cell_height: f64, aspect_ratio: f64) -> (f64, f64) {
    if cell_width / cell_height > aspect_ratio {
        // Height binds.
        (cell_height * aspect_ratio, cell_height)
    } else {
        (cell_width, cell_width / aspect_ratio)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const WIDE: f64 = 16.0 / 9.0;

    #[test]
    fn two_party_wide_container_goes_side_by_side() {
        let layout = compute_layout(1200.0, 600.0, 2, WIDE);
        assert_eq!(layout.cols, 2);
        assert_eq!(layout.rows, 1);
        assert!((layout.tile_width - 600.0).abs() < 1e-9);
        assert!((layout.tile_height - 337.5).abs() < 1e-9);
    }

    #[test]
    fn two_party_tall_container_stacks() {
        let layout = compute_layout(600.0, 1200.0, 2, WIDE);
        assert_eq!((layout.cols, layout.rows), (1, 2));
    }

    #[test]
    fn four_tiles_in_matching_container_form_square_grid() {
        let layout = compute_layout(1600.0, 900.0, 4, WIDE);
        assert_eq!((layout.cols, layout.rows), (2, 2));
        assert!((layout.tile_width - 800.0).abs() < 1e-9);
        assert!((layout.tile_height - 450.0).abs() < 1e-9);
    }

    #[test]
    fn single_tile_is_bounded_by_height_in_wide_container() {
        let layout = compute_layout(2000.0, 900.0, 1, WIDE);
        assert_eq!((layout.cols, layout.rows), (1, 1));
        assert!((layout.tile_height - 900.0).abs() < 1e-9);
        assert!((layout.tile_width - 1600.0).abs() < 1e-9);
    }

    #[test]
    fn equal_area_tie_keeps_smallest_column_count() {
        // 1x2 and 2x1 both give 300x300 tiles.
        let layout = compute_layout(600.0, 600.0, 2, 1.0);
        assert_eq!((layout.cols, layout.rows), (1, 2));
    }

    #[test]
    fn degenerate_inputs_collapse_to_single_column() {
        assert_eq!(compute_layout(0.0, 600.0, 3, WIDE), GridLayout::DEGENERATE);
        assert_eq!(compute_layout(800.0, -1.0, 3, WIDE), GridLayout::DEGENERATE);
        assert_eq!(compute_layout(800.0, 600.0, 0, WIDE), GridLayout::DEGENERATE);
        assert_eq!(compute_layout(f64::NAN, 600.0, 2, WIDE), GridLayout::DEGENERATE);
    }

    #[test]
    fn invalid_aspect_ratio_falls_back_to_default() {
        let fallback = compute_layout(1200.0, 600.0, 2, 0.0);
        let explicit = compute_layout(1200.0, 600.0, 2, DEFAULT_ASPECT_RATIO);
        assert_eq!(fallback, explicit);
        assert_eq!(compute_layout(1200.0, 600.0, 2, f64::INFINITY), explicit);
    }

    #[test]
    fn tile_rects_centre_partial_last_row() {
        let container = Size::new(1200.0, 600.0);
        let layout = GridLayout {
            cols: 2,
            rows: 2,
            tile_width: 400.0,
            tile_height: 225.0,
        };
        let rects = layout.tile_rects(container, 3);
        assert_eq!(rects.len(), 3);
        // Cells are 600x300; tiles are inset by (100, 37.5).
        assert_eq!(rects[0], Rect::new(100.0, 37.5, 400.0, 225.0));
        assert_eq!(rects[1], Rect::new(700.0, 37.5, 400.0, 225.0));
        // Lone tile on the second row shifts half a cell to the right.
        assert_eq!(rects[2], Rect::new(400.0, 337.5, 400.0, 225.0));
    }

    #[test]
    fn tile_rects_empty_for_degenerate_container() {
        let layout = compute_layout(800.0, 600.0, 2, WIDE);
        assert!(layout.tile_rects(Size::new(0.0, 600.0), 2).is_empty());
        assert!(layout.tile_rects(Size::new(800.0, 600.0), 0).is_empty());
    }

    proptest! {
        #[test]
        fn layout_is_total(
            tile_count in 1usize..=64,
            width in 100.0f64..4000.0,
            height in 100.0f64..4000.0,
            aspect in prop_oneof![Just(16.0 / 9.0), Just(4.0 / 3.0), Just(1.0), 0.25f64..4.0],
        ) {
            let layout = compute_layout(width, height, tile_count, aspect);
            prop_assert!(layout.cols >= 1 && layout.cols <= tile_count);
            prop_assert!(layout.rows >= 1);
            prop_assert!(layout.capacity() >= tile_count);
            prop_assert!(layout.tile_width > 0.0 && layout.tile_height > 0.0);

            let cell_width = width / layout.cols as f64;
            let cell_height = height / layout.rows as f64;
            prop_assert!(layout.tile_width <= cell_width + 1e-9);
            prop_assert!(layout.tile_height <= cell_height + 1e-9);
            prop_assert!((layout.tile_width / layout.tile_height - aspect).abs() < 1e-6);
        }

        #[test]
        fn tile_rects_stay_inside_container(
            tile_count in 1usize..=32,
            width in 100.0f64..3000.0,
            height in 100.0f64..3000.0,
        ) {
            let container = Size::new(width, height);
            let layout = GridLayout::solve(container, tile_count, WIDE);
            let rects = layout.tile_rects(container, tile_count);
            prop_assert_eq!(rects.len(), tile_count);
            for rect in rects {
                prop_assert!(rect.x >= -1e-9 && rect.y >= -1e-9);
                prop_assert!(rect.right() <= width + 1e-6);
                prop_assert!(rect.bottom() <= height + 1e-6);
            }
        }
    }
}
