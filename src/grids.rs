//! Output grids of one generation attempt

use crate::tilemap::{Cell, Tilemap};

/// Tunnel width per cell, plus the optional cross-section grids.
///
/// `caves` is 0.0 for solid rock. `depth` and `offset` are only meaningful
/// where `caves > 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct CaveGrids {
    pub caves: Tilemap<f32>,
    pub depth: Option<Tilemap<f32>>,
    pub offset: Option<Tilemap<f32>>,
}

impl CaveGrids {
    pub fn new(width: usize, height: usize, with_depth_offset: bool) -> Self {
        let extra = || with_depth_offset.then(|| Tilemap::new(width, height));
        Self {
            caves: Tilemap::new(width, height),
            depth: extra(),
            offset: extra(),
        }
    }

    pub fn width(&self) -> usize {
        self.caves.width
    }

    pub fn height(&self) -> usize {
        self.caves.height
    }

    /// Width stored at a cell; off-map cells read as solid.
    pub fn width_at(&self, (x, z): Cell) -> f32 {
        self.caves.try_get(x, z).copied().unwrap_or(0.0)
    }

    pub fn is_carved(&self, cell: Cell) -> bool {
        self.width_at(cell) > 0.0
    }

    /// Combine a painted width with the stored one; overlaps keep the maximum.
    pub fn raise_width(&mut self, (x, z): Cell, width: f32) {
        if let Some(stored) = self.caves.try_get_mut(x, z) {
            *stored = stored.max(width);
        }
    }

    /// Write the cross-section values of a cell, if those grids exist.
    pub fn set_depth_offset(&mut self, (x, z): Cell, depth: f32, offset: f32) {
        if let Some(grid) = self.depth.as_mut() {
            if let Some(v) = grid.try_get_mut(x, z) {
                *v = depth;
            }
        }
        if let Some(grid) = self.offset.as_mut() {
            if let Some(v) = grid.try_get_mut(x, z) {
                *v = offset;
            }
        }
    }

    /// Number of carved cells.
    pub fn carved_count(&self) -> usize {
        self.caves.iter().filter(|(_, _, &w)| w > 0.0).count()
    }
}
