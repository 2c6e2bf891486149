//! Fixed tile grid over the captured surface.

use std::cmp;

// ── Tile ─────────────────────────────────────────────────────────

/// One grid cell and the hash of its last transmitted contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
    /// `None` until the cell has been sent once; never equal to a
    /// computed hash.
    pub last_hash: Option<u32>,
}

// ── TileGrid ─────────────────────────────────────────────────────

/// Row-major grid of `tile_size × tile_size` cells; the last row and
/// column are clamped to the surface edge.
#[derive(Debug, Clone)]
pub struct TileGrid {
    width: u32,
    height: u32,
    tile_size: u32,
    tiles: Vec<Tile>,
}

impl TileGrid {
    /// An empty grid; the first [`ensure`](Self::ensure) builds it.
    pub fn new(tile_size: u32) -> Self {
        assert!(tile_size > 0, "tile_size must be > 0");
        Self {
            width: 0,
            height: 0,
            tile_size,
            tiles: Vec::new(),
        }
    }

    pub fn build(width: u32, height: u32, tile_size: u32) -> Self {
        let mut grid = Self::new(tile_size);
        grid.ensure(width, height);
        grid
    }

    /// Rebuild the grid if the surface dimensions changed. Every cell
    /// of a rebuilt grid is dirty. Returns `true` on rebuild.
    pub fn ensure(&mut self, width: u32, height: u32) -> bool {
        if width == self.width && height == self.height && !self.tiles.is_empty() {
            return false;
        }

        let ts = self.tile_size;
        let mut tiles = Vec::with_capacity(tile_count(width, height, ts));
        for y in (0..height).step_by(ts as usize) {
            for x in (0..width).step_by(ts as usize) {
                tiles.push(Tile {
                    x,
                    y,
                    width: cmp::min(ts, width - x),
                    height: cmp::min(ts, height - y),
                    last_hash: None,
                });
            }
        }

        self.width = width;
        self.height = height;
        self.tiles = tiles;
        true
    }

    /// Forget every stored hash so the next pass sends all cells.
    pub fn invalidate(&mut self) {
        for tile in &mut self.tiles {
            tile.last_hash = None;
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn tile_size(&self) -> u32 {
        self.tile_size
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    pub fn tiles_mut(&mut self) -> &mut [Tile] {
        &mut self.tiles
    }
}

/// Number of cells for a `width × height` surface.
pub fn tile_count(width: u32, height: u32, tile_size: u32) -> usize {
    let cols = width.div_ceil(tile_size) as usize;
    let rows = height.div_ceil(tile_size) as usize;
    cols * rows
}

// ── Tests ────────────────────────────────────────────────────────
