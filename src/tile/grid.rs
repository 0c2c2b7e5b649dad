//! Tile grid traversal.
//!
//! The grid enumerates tile origins in row-major order: every x for the
//! first tile row, then every x for the next row, and so on. Counts use
//! ceiling division, so the last column and row may extend past the image
//! edge; those tiles are still addressed at full tile size.
//!
//! ```text
//! width = 40, tile = 16        (0,0) (16,0) (32,0)
//! height = 20                  (0,16) (16,16) (32,16)
//! ```

use std::fmt;

use serde::Serialize;

use crate::error::EngineError;

/// Pixel origin of a tile. Both components are multiples of the tile size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
}

impl TileCoord {
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }
}

impl fmt::Display for TileCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Image and tile dimensions with the derived tile counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_width: u32,
    tile_height: u32,
}

impl TileGrid {
    /// Create a grid. Every dimension must be positive.
    pub fn new(
        width: u32,
        height: u32,
        tile_width: u32,
        tile_height: u32,
    ) -> Result<Self, EngineError> {
        if width == 0 || height == 0 || tile_width == 0 || tile_height == 0 {
            return Err(EngineError::InvalidGeometry(format!(
                "image {}x{} with tile {}x{}",
                width, height, tile_width, tile_height
            )));
        }
        Ok(Self {
            width,
            height,
            tile_width,
            tile_height,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_width(&self) -> u32 {
        self.tile_width
    }

    pub fn tile_height(&self) -> u32 {
        self.tile_height
    }

    /// Tiles per row.
    pub fn tiles_across(&self) -> u32 {
        self.width.div_ceil(self.tile_width)
    }

    /// Tile rows.
    pub fn tiles_down(&self) -> u32 {
        self.height.div_ceil(self.tile_height)
    }

    pub fn tile_count(&self) -> usize {
        self.tiles_across() as usize * self.tiles_down() as usize
    }

    /// Row-major position of `coord`, or `None` if it is not a tile origin
    /// inside the image.
    pub fn tile_index(&self, coord: TileCoord) -> Option<usize> {
        if coord.x >= self.width
            || coord.y >= self.height
            || coord.x % self.tile_width != 0
            || coord.y % self.tile_height != 0
        {
            return None;
        }
        let column = (coord.x / self.tile_width) as usize;
        let row = (coord.y / self.tile_height) as usize;
        Some(row * self.tiles_across() as usize + column)
    }

    /// Origin of the tile at row-major position `index`.
    pub fn coord_at(&self, index: usize) -> Option<TileCoord> {
        if index >= self.tile_count() {
            return None;
        }
        let across = self.tiles_across() as usize;
        Some(TileCoord {
            x: (index % across) as u32 * self.tile_width,
            y: (index / across) as u32 * self.tile_height,
        })
    }

    /// Iterate tile origins in row-major order.
    ///
    /// The iterator is cheap to clone and a clone resumes from the same
    /// position.
    pub fn iter(&self) -> TileIter {
        TileIter {
            grid: *self,
            next: 0,
            end: self.tile_count(),
        }
    }
}

impl IntoIterator for &TileGrid {
    type Item = TileCoord;
    type IntoIter = TileIter;

    fn into_iter(self) -> TileIter {
        self.iter()
    }
}

/// Row-major iterator over tile origins.
#[derive(Debug, Clone)]
pub struct TileIter {
    grid: TileGrid,
    next: usize,
    end: usize,
}

impl Iterator for TileIter {
    type Item = TileCoord;

    fn next(&mut self) -> Option<TileCoord> {
        if self.next >= self.end {
            return None;
        }
        let coord = self.grid.coord_at(self.next);
        self.next += 1;
        coord
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.end - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for TileIter {}

// =============================================================================
// Tests
// =============================================================================
