use crate::error::WorldError;
use crate::tile::Tile;
use std::fmt;
use stratum_catalog::TileCatalog;
use stratum_common::Point;

/// Largest world this build will hold: the biggest layout the original
/// generator produces.
pub const MAX_WORLD_WIDTH: usize = 8400;
pub const MAX_WORLD_HEIGHT: usize = 2400;

/// World header fields that ride alongside the tile block.
#[derive(Debug, Clone, Default)]
pub struct WorldMeta {
    pub version: u32,
    pub title: String,
    pub width: i32,
    pub height: i32,
    pub spawn: Point,
    pub ground_level: i32,
    pub rock_level: i32,
    pub game_time: f64,
    pub day_time: bool,
    pub moon_phase: i32,
    pub blood_moon: bool,
    pub dungeon: Point,
    pub killed_boss_1: bool,
    pub killed_boss_2: bool,
    pub killed_boss_3: bool,
    pub saved_tinkerer: bool,
    pub saved_wizard: bool,
    pub saved_mechanic: bool,
    pub killed_goblins: bool,
    pub killed_clown: bool,
    pub killed_frost: bool,
    pub smashed_shadow_orb: bool,
    pub spawned_meteor: bool,
    pub shadow_orb_count: u8,
    pub altars_smashed: i32,
    pub hard_mode: bool,
    pub invasion_delay: i32,
    pub invasion_size: i32,
    pub invasion_type: i32,
    pub invasion_x: f64,
}

/// Fixed-capacity column-major tile array. The backing store is allocated
/// once; loads only move the active width/height and blank the cells.
pub struct TileGrid {
    tiles: Vec<Tile>,
    cap_width: usize,
    cap_height: usize,
    width: usize,
    height: usize,
}

impl TileGrid {
    /// A grid sized for any world the format allows. This is a large
    /// allocation; construct one per process and hand it between loads.
    pub fn new() -> Self {
        Self::with_capacity(MAX_WORLD_WIDTH, MAX_WORLD_HEIGHT)
    }

    /// A grid with a smaller fixed capacity. Loads beyond it fail with
    /// `UnsupportedWorldSize`.
    pub fn with_capacity(cap_width: usize, cap_height: usize) -> Self {
        Self {
            tiles: vec![Tile::blank(); cap_width * cap_height],
            cap_width,
            cap_height,
            width: 0,
            height: 0,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn capacity(&self) -> (usize, usize) {
        (self.cap_width, self.cap_height)
    }

    /// Sets the active region for a new load and blanks every cell.
    pub fn reset(&mut self, width: usize, height: usize) -> Result<(), WorldError> {
        if width > self.cap_width || height > self.cap_height {
            return Err(WorldError::UnsupportedWorldSize {
                width: width as i32,
                height: height as i32,
            });
        }
        self.width = width;
        self.height = height;
        for tile in &mut self.tiles {
            *tile = Tile::blank();
        }
        Ok(())
    }

    #[inline]
    fn index(&self, x: usize, y: usize) -> usize {
        debug_assert!(x < self.width && y < self.height);
        x * self.height + y
    }

    #[inline]
    pub fn tile(&self, x: usize, y: usize) -> &Tile {
        &self.tiles[self.index(x, y)]
    }

    #[inline]
    pub fn tile_mut(&mut self, x: usize, y: usize) -> &mut Tile {
        let index = self.index(x, y);
        &mut self.tiles[index]
    }

    /// Bounds-checked lookup for neighbor scans.
    pub fn get(&self, x: i64, y: i64) -> Option<&Tile> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }
        Some(self.tile(x as usize, y as usize))
    }

    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// Writes `count` run-length continuation copies of the cell at
    /// (x, y) down the same column, returning how many cells were filled.
    /// Wall sprite coordinates restart as unresolved in every copy.
    pub fn fill_run_down(&mut self, x: usize, y: usize, count: usize) -> usize {
        let template = self.tile(x, y).run_copy();
        let last = (y + count).min(self.height.saturating_sub(1));
        let mut filled = 0;
        for run_y in y + 1..=last {
            *self.tile_mut(x, run_y) = template;
            filled += 1;
        }
        filled
    }

    /// Same continuation rule along a row, used by network tile rows.
    pub fn fill_run_right(&mut self, x: usize, y: usize, count: usize) -> usize {
        let template = self.tile(x, y).run_copy();
        let last = (x + count).min(self.width.saturating_sub(1));
        let mut filled = 0;
        for run_x in x + 1..=last {
            *self.tile_mut(run_x, y) = template;
            filled += 1;
        }
        filled
    }

    /// Resets sprite resolution for every active or walled tile in the
    /// given tile-coordinate rectangle (inclusive bounds, clamped).
    pub fn invalidate_sprites_in(&mut self, x0: usize, y0: usize, x1: usize, y1: usize) {
        let x1 = x1.min(self.width.saturating_sub(1));
        let y1 = y1.min(self.height.saturating_sub(1));
        for x in x0..=x1 {
            for y in y0..=y1 {
                let tile = self.tile_mut(x, y);
                if tile.active || tile.wall > 0 {
                    tile.invalidate_sprites();
                }
            }
        }
    }

    /// Names whatever occupies a cell, for a pointer status line. Active
    /// tiles shadow liquids, liquids shadow walls.
    pub fn describe(&self, catalog: &TileCatalog, x: usize, y: usize) -> String {
        if x >= self.width || y >= self.height {
            return String::new();
        }
        let tile = self.tile(x, y);
        let mut label = "Nothing";
        let wall_name;
        let tile_name;
        if tile.wall > 0 {
            if let Some(wall) = catalog.wall(tile.wall) {
                wall_name = wall.name.clone();
                label = &wall_name;
            }
        }
        if tile.liquid > 0 {
            label = if tile.lava { "Lava" } else { "Water" };
        }
        if tile.active {
            tile_name = catalog.resolve(tile.type_id, tile.u, tile.v).name.to_owned();
            label = &tile_name;
        }
        format!("{},{} {}", x, y, label)
    }
}

impl Default for TileGrid {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for TileGrid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TileGrid")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("capacity", &(self.cap_width, self.cap_height))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::SPRITE_NONE;
    use assert_matches::assert_matches;

    #[test]
    fn test_reset_blanks_and_bounds() {
        let mut grid = TileGrid::with_capacity(16, 16);
        grid.reset(8, 8).unwrap();
        grid.tile_mut(3, 3).active = true;
        grid.reset(8, 8).unwrap();
        assert!(!grid.tile(3, 3).active);
        assert_matches!(
            grid.reset(20, 8),
            Err(WorldError::UnsupportedWorldSize { .. })
        );
    }

    #[test]
    fn test_fill_run_copies_and_clips() {
        let mut grid = TileGrid::with_capacity(4, 8);
        grid.reset(4, 8).unwrap();
        {
            let tile = grid.tile_mut(1, 2);
            tile.active = true;
            tile.type_id = 30;
            tile.wall = 4;
            tile.wall_u = 18;
            tile.wall_v = 0;
        }
        let filled = grid.fill_run_down(1, 2, 3);
        assert_eq!(filled, 3);
        for y in 3..=5 {
            let copy = grid.tile(1, y);
            assert!(copy.active);
            assert_eq!(copy.type_id, 30);
            assert_eq!(copy.wall, 4);
            assert_eq!(copy.wall_u, SPRITE_NONE);
        }
        // A run that would leave the column clips at the bottom edge.
        assert_eq!(grid.fill_run_down(1, 6, 10), 1);
    }

    #[test]
    fn test_invalidate_region_skips_empty_cells() {
        let mut grid = TileGrid::with_capacity(4, 4);
        grid.reset(4, 4).unwrap();
        {
            let tile = grid.tile_mut(1, 1);
            tile.active = true;
            tile.u = 18;
            tile.v = 18;
        }
        grid.tile_mut(2, 2).u = 18; // inactive, must stay untouched
        grid.invalidate_sprites_in(0, 0, 3, 3);
        assert_eq!(grid.tile(1, 1).u, SPRITE_NONE);
        assert_eq!(grid.tile(2, 2).u, 18);
    }

    #[test]
    fn test_describe_precedence() {
        let catalog = TileCatalog::builtin();
        let mut grid = TileGrid::with_capacity(4, 4);
        grid.reset(4, 4).unwrap();
        {
            let tile = grid.tile_mut(0, 0);
            tile.wall = 1;
            tile.liquid = 100;
            tile.lava = true;
        }
        assert_eq!(grid.describe(catalog, 0, 0), "0,0 Lava");
        grid.tile_mut(0, 0).active = true;
        grid.tile_mut(0, 0).type_id = 1;
        assert_eq!(grid.describe(catalog, 0, 0), "0,0 Stone");
    }
}
