//! Four-pass light simulation. A zero pass, a seeding pass (sunlight, lava
//! glow, catalog emission), then one forward and one backward sweep that
//! each pull light from two of the four neighbors. The sweeps are a
//! deliberate two-direction approximation of a flood fill; visual parity
//! with the original output depends on keeping them exactly as they are.

use stratum_catalog::TileCatalog;
use stratum_world::{Tile, TileGrid};

/// Light lost per tile crossed, in the unit range.
pub const DECAY_CLEAR: f32 = 0.04;
pub const DECAY_SOLID: f32 = 0.16;

/// Background wall that still lets sky light through.
pub const SEE_THROUGH_WALL: u8 = 21;

/// Floor applied to lava-bearing tiles: scalar, then R, G, B.
pub const LAVA_GLOW: [f32; 4] = [0.66, 0.66, 0.39, 0.13];

fn quantize(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0) as u8
}

fn channels(tile: &Tile) -> [u8; 4] {
    [tile.light, tile.light_r, tile.light_g, tile.light_b]
}

fn set_channels(tile: &mut Tile, values: [u8; 4]) {
    tile.light = values[0];
    tile.light_r = values[1];
    tile.light_g = values[2];
    tile.light_b = values[3];
}

pub struct LightPropagator<'a> {
    catalog: &'a TileCatalog,
}

impl<'a> LightPropagator<'a> {
    pub fn new(catalog: &'a TileCatalog) -> Self {
        Self { catalog }
    }

    /// True when the tile blocks light.
    fn opaque(&self, tile: &Tile) -> bool {
        tile.active
            && self
                .catalog
                .tile(tile.type_id)
                .is_some_and(|info| !info.transparent)
    }

    fn decay(&self, tile: &Tile) -> u8 {
        if self.opaque(tile) {
            quantize(DECAY_SOLID)
        } else {
            quantize(DECAY_CLEAR)
        }
    }

    /// Runs all four passes over a populated grid. Must happen after the
    /// grid is final and before the first render; reports per-row progress
    /// across the whole run.
    pub fn run(&self, grid: &mut TileGrid, ground_level: i32, progress: &mut dyn FnMut(f32)) {
        let width = grid.width();
        let height = grid.height();
        if width == 0 || height == 0 {
            return;
        }
        let total_rows = (height * 4) as f32;
        let mut rows_done = 0usize;
        let mut row_done = |rows_done: &mut usize, progress: &mut dyn FnMut(f32)| {
            *rows_done += 1;
            progress(*rows_done as f32 / total_rows);
        };

        // Pass 1: darkness.
        for y in 0..height {
            for x in 0..width {
                set_channels(grid.tile_mut(x, y), [0; 4]);
            }
            row_done(&mut rows_done, progress);
        }

        // Pass 2: seeds.
        let lava_glow = LAVA_GLOW.map(quantize);
        for y in 0..height {
            let sunlit_depth = (y as i32) < ground_level;
            for x in 0..width {
                let tile = grid.tile(x, y);
                let mut light = channels(tile);
                if sunlit_depth
                    && !self.opaque(tile)
                    && (tile.wall == 0 || tile.wall == SEE_THROUGH_WALL)
                    && tile.liquid < 255
                {
                    light = [255; 4];
                }
                if tile.liquid > 0 && tile.lava {
                    for (value, glow) in light.iter_mut().zip(lava_glow) {
                        *value = (*value).max(glow);
                    }
                }
                if tile.active {
                    if let Some(info) = self.catalog.tile(tile.type_id) {
                        let emission = [info.light, info.light_r, info.light_g, info.light_b];
                        for (value, emitted) in light.iter_mut().zip(emission) {
                            *value = (*value).max(quantize(emitted));
                        }
                    }
                }
                set_channels(grid.tile_mut(x, y), light);
            }
            row_done(&mut rows_done, progress);
        }

        // Pass 3: forward sweep, pulling from up and left.
        for y in 0..height {
            for x in 0..width {
                let up = if y > 0 { channels(grid.tile(x, y - 1)) } else { [0; 4] };
                let left = if x > 0 { channels(grid.tile(x - 1, y)) } else { [0; 4] };
                let decay = self.decay(grid.tile(x, y));
                let tile = grid.tile_mut(x, y);
                let mut light = channels(tile);
                for i in 0..4 {
                    light[i] = light[i]
                        .max(up[i].saturating_sub(decay))
                        .max(left[i].saturating_sub(decay));
                }
                set_channels(tile, light);
            }
            row_done(&mut rows_done, progress);
        }

        // Pass 4: backward sweep, pulling from down and right.
        for y in (0..height).rev() {
            for x in (0..width).rev() {
                let down = if y + 1 < height {
                    channels(grid.tile(x, y + 1))
                } else {
                    [0; 4]
                };
                let right = if x + 1 < width {
                    channels(grid.tile(x + 1, y))
                } else {
                    [0; 4]
                };
                let decay = self.decay(grid.tile(x, y));
                let tile = grid.tile_mut(x, y);
                let mut light = channels(tile);
                for i in 0..4 {
                    light[i] = light[i]
                        .max(down[i].saturating_sub(decay))
                        .max(right[i].saturating_sub(decay));
                }
                set_channels(tile, light);
            }
            row_done(&mut rows_done, progress);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_grid(width: usize, height: usize) -> TileGrid {
        let mut grid = TileGrid::with_capacity(width, height);
        grid.reset(width, height).unwrap();
        grid
    }

    fn run(grid: &mut TileGrid, ground_level: i32) {
        let catalog = TileCatalog::builtin();
        let mut last = 0.0;
        LightPropagator::new(catalog).run(grid, ground_level, &mut |fraction| last = fraction);
        assert_eq!(last, 1.0);
    }

    #[test]
    fn test_open_sky_is_fully_sunlit() {
        let mut grid = open_grid(5, 5);
        run(&mut grid, 10);
        for x in 0..5 {
            for y in 0..5 {
                assert_eq!(grid.tile(x, y).light, 255);
                assert_eq!(grid.tile(x, y).light_scalar(), 1.0);
            }
        }
    }

    #[test]
    fn test_walled_cell_lit_by_neighbors_within_one_decay() {
        let mut grid = open_grid(5, 5);
        grid.tile_mut(2, 2).wall = 1; // not seeded, but neighbors are
        run(&mut grid, 10);
        let lit = grid.tile(2, 2).light_scalar();
        assert!(lit >= 1.0 - DECAY_CLEAR, "got {}", lit);
        assert!(lit < 1.0);
    }

    #[test]
    fn test_glass_wall_is_see_through() {
        let mut grid = open_grid(3, 3);
        grid.tile_mut(1, 1).wall = SEE_THROUGH_WALL;
        run(&mut grid, 10);
        assert_eq!(grid.tile(1, 1).light, 255);
    }

    #[test]
    fn test_opaque_decay_is_stronger() {
        let mut grid = open_grid(7, 3);
        // A run of stone below ground level, lit from the left edge.
        for x in 2..7 {
            for y in 0..3 {
                let tile = grid.tile_mut(x, y);
                tile.active = true;
                tile.type_id = 1;
            }
        }
        run(&mut grid, 10);
        let first = grid.tile(2, 1).light;
        let second = grid.tile(3, 1).light;
        assert_eq!(first, 255 - quantize(DECAY_SOLID));
        assert_eq!(second, first - quantize(DECAY_SOLID));
    }

    #[test]
    fn test_lava_floor_applies_by_max() {
        let mut grid = open_grid(3, 3);
        // Below ground: no sunlight anywhere.
        let tile = grid.tile_mut(1, 1);
        tile.liquid = 200;
        tile.lava = true;
        run(&mut grid, 0);
        let tile = grid.tile(1, 1);
        assert_eq!(tile.light, quantize(LAVA_GLOW[0]));
        assert_eq!(tile.light_r, quantize(LAVA_GLOW[1]));
        assert_eq!(tile.light_g, quantize(LAVA_GLOW[2]));
        assert_eq!(tile.light_b, quantize(LAVA_GLOW[3]));
    }

    #[test]
    fn test_catalog_emission_floors_channels() {
        let mut grid = open_grid(3, 3);
        let tile = grid.tile_mut(1, 1);
        tile.active = true;
        tile.type_id = 4; // torch
        run(&mut grid, 0);
        let torch = grid.tile(1, 1);
        assert_eq!(torch.light, 255);
        assert!(torch.light_b < torch.light_r);
        // Light spreads to the dark neighbor minus one clear-decay step.
        assert_eq!(grid.tile(2, 1).light, 255 - quantize(DECAY_CLEAR));
    }

    #[test]
    fn test_full_liquid_blocks_sunlight_seed() {
        let mut grid = open_grid(3, 3);
        grid.tile_mut(1, 0).liquid = 255;
        grid.tile_mut(1, 0).lava = false;
        run(&mut grid, 10);
        // Not seeded directly, but sideways propagation still reaches it.
        assert_eq!(grid.tile(1, 0).light, 255 - quantize(DECAY_CLEAR));
    }

    #[test]
    fn test_channels_stay_in_unit_range() {
        let mut grid = open_grid(8, 8);
        for x in 0..8 {
            for y in 4..8 {
                let tile = grid.tile_mut(x, y);
                tile.active = true;
                tile.type_id = if (x + y) % 3 == 0 { 4 } else { 1 };
                if x % 2 == 0 {
                    tile.liquid = 128;
                    tile.lava = x % 4 == 0;
                }
            }
        }
        run(&mut grid, 4);
        for x in 0..8 {
            for y in 0..8 {
                let tile = grid.tile(x, y);
                let (r, g, b) = tile.light_rgb();
                for value in [tile.light_scalar(), r, g, b] {
                    assert!((0.0..=1.0).contains(&value));
                }
            }
        }
    }
}
