//! Neighbor-driven sprite resolution. A tile's frame is a pure function of
//! its 4-neighbor (and, when fully surrounded, diagonal) adjacency; one of
//! three decorative variants per frame is picked at random, so the resolver
//! carries a seedable RNG to make output reproducible.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use stratum_catalog::TileCatalog;
use stratum_world::TileGrid;

const TILE_TORCH: u8 = 4;
const TILE_PLATFORM: u8 = 19;
const TILE_CANDLE: u8 = 33;
const TILE_WATER_CANDLE: u8 = 49;

const TILE_DIRT: u8 = 0;
const TILE_MUD: u8 = 59;

/// Edge frames indexed by the cardinal adjacency mask
/// (bit 3 = up, bit 2 = down, bit 1 = left, bit 0 = right),
/// three decorative variants each. Sheet steps are 18 pixels.
const UV_EDGES: [[(i16, i16); 3]; 16] = [
    [(162, 54), (180, 54), (198, 54)], // isolated
    [(162, 0), (180, 0), (198, 0)],    // right
    [(162, 18), (180, 18), (198, 18)], // left
    [(108, 54), (126, 54), (144, 54)], // left + right
    [(108, 0), (126, 0), (144, 0)],    // down
    [(0, 54), (36, 54), (72, 54)],     // down + right
    [(18, 54), (54, 54), (90, 54)],    // down + left
    [(18, 0), (36, 0), (54, 0)],       // down + left + right
    [(108, 72), (126, 72), (144, 72)], // up
    [(0, 72), (36, 72), (72, 72)],     // up + right
    [(18, 72), (54, 72), (90, 72)],    // up + left
    [(18, 36), (36, 36), (54, 36)],    // up + left + right
    [(90, 0), (90, 18), (90, 36)],     // up + down
    [(0, 0), (0, 18), (0, 36)],        // up + down + right
    [(72, 0), (72, 18), (72, 36)],     // up + down + left
    [(18, 18), (36, 18), (54, 18)],    // surrounded
];

/// Fully-surrounded families picked by which diagonal pair is missing.
const UV_CENTER: [(i16, i16); 3] = [(18, 18), (36, 18), (54, 18)];
const UV_OPEN_TOP: [(i16, i16); 3] = [(108, 18), (126, 18), (144, 18)];
const UV_OPEN_BOTTOM: [(i16, i16); 3] = [(108, 36), (126, 36), (144, 36)];
const UV_OPEN_LEFT: [(i16, i16); 3] = [(216, 0), (216, 18), (216, 36)];
const UV_OPEN_RIGHT: [(i16, i16); 3] = [(234, 0), (234, 18), (234, 36)];

/// Platform caps by support state
/// (bit 3 = platform left, bit 2 = platform right,
///  bit 1 = nothing left, bit 0 = nothing right).
/// Contradictory bit mixes cannot occur; those slots fall back to the
/// floating cap.
const UV_PLATFORMS: [i16; 16] = [
    0,   // 0b0000 solid block both sides
    108, // 0b0001 solid left, open right
    126, // 0b0010 open left, solid right
    54,  // 0b0011 floating
    72,  // 0b0100 solid left, platform right
    54,  // 0b0101
    36,  // 0b0110 open left, platform right
    54,  // 0b0111
    90,  // 0b1000 platform left, solid right
    18,  // 0b1001 platform left, open right
    54,  // 0b1010
    54,  // 0b1011
    0,   // 0b1100 platform both sides
    54,  // 0b1101
    54,  // 0b1110
    54,  // 0b1111
];

pub struct AutotileResolver {
    rng: SmallRng,
}

impl AutotileResolver {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    /// Deterministic resolver for reproducible output.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }

    /// Resolves every unresolved tile and wall frame in the grid.
    pub fn resolve_all(&mut self, grid: &mut TileGrid, catalog: &TileCatalog) {
        for x in 0..grid.width() {
            for y in 0..grid.height() {
                let tile = grid.tile(x, y);
                if tile.active && tile.needs_sprite() {
                    let (u, v) = self.resolve_tile(grid, catalog, x, y);
                    let tile = grid.tile_mut(x, y);
                    tile.u = u;
                    tile.v = v;
                }
                let tile = grid.tile(x, y);
                if tile.wall > 0 && tile.needs_wall_sprite() {
                    let (u, v) = self.resolve_wall(grid, x, y);
                    let tile = grid.tile_mut(x, y);
                    tile.wall_u = u;
                    tile.wall_v = v;
                }
            }
        }
    }

    /// Frame for the foreground block at (x, y) given current neighbors.
    pub fn resolve_tile(
        &mut self,
        grid: &TileGrid,
        catalog: &TileCatalog,
        x: usize,
        y: usize,
    ) -> (i16, i16) {
        let (x, y) = (x as i64, y as i64);
        let own = grid.tile(x as usize, y as usize).type_id;

        let active_type = |dx: i64, dy: i64| -> Option<u8> {
            grid.get(x + dx, y + dy)
                .filter(|t| t.active)
                .map(|t| t.type_id)
        };

        match own {
            TILE_CANDLE | TILE_WATER_CANDLE => return (0, 0),
            TILE_TORCH => {
                // Free-standing on a floor, otherwise mounted on whichever
                // side has a neighbor.
                let u = if active_type(0, 1).is_some() {
                    0
                } else if active_type(-1, 0).is_some() {
                    22
                } else {
                    44
                };
                return (u, 0);
            }
            TILE_PLATFORM => {
                let left = active_type(-1, 0);
                let right = active_type(1, 0);
                let mut mask = 0usize;
                if left == Some(own) {
                    mask |= 8;
                }
                if right == Some(own) {
                    mask |= 4;
                }
                if left.is_none() {
                    mask |= 2;
                }
                if right.is_none() {
                    mask |= 1;
                }
                return (UV_PLATFORMS[mask], 0);
            }
            _ => {}
        }

        let joined = |dx: i64, dy: i64| -> bool {
            match active_type(dx, dy) {
                Some(other) => same_family(catalog, own, other),
                None => false,
            }
        };

        let up = joined(0, -1);
        let down = joined(0, 1);
        let left = joined(-1, 0);
        let right = joined(1, 0);
        let set = self.rng.gen_range(0..3);

        if up && down && left && right {
            let tl = joined(-1, -1);
            let tr = joined(1, -1);
            let bl = joined(-1, 1);
            let br = joined(1, 1);
            let family = if !tl && !tr {
                &UV_OPEN_TOP
            } else if !bl && !br {
                &UV_OPEN_BOTTOM
            } else if !tl && !bl {
                &UV_OPEN_LEFT
            } else if !tr && !br {
                &UV_OPEN_RIGHT
            } else {
                &UV_CENTER
            };
            return family[set];
        }

        let mask = ((up as usize) << 3) | ((down as usize) << 2) | ((left as usize) << 1) | right as usize;
        UV_EDGES[mask][set]
    }

    /// Frame for the wall at (x, y). Walls only care whether a neighbor
    /// has any wall at all; no special cases.
    pub fn resolve_wall(&mut self, grid: &TileGrid, x: usize, y: usize) -> (i16, i16) {
        let (x, y) = (x as i64, y as i64);
        let walled = |dx: i64, dy: i64| -> bool {
            grid.get(x + dx, y + dy).map_or(false, |t| t.wall > 0)
        };
        let mask = ((walled(0, -1) as usize) << 3)
            | ((walled(0, 1) as usize) << 2)
            | ((walled(-1, 0) as usize) << 1)
            | walled(1, 0) as usize;
        let set = self.rng.gen_range(0..3);
        UV_EDGES[mask][set]
    }
}

impl Default for AutotileResolver {
    fn default() -> Self {
        Self::new()
    }
}

/// Whether a neighbor of type `other` counts as "the same" as `own` for
/// edge matching. Stones all join each other, and dirt, mud, and the grass
/// family are mutually interchangeable; the distinction is purely visual
/// and only applies to matching, never to the tile's own identity.
fn same_family(catalog: &TileCatalog, own: u8, other: u8) -> bool {
    if own == other {
        return true;
    }
    let (Some(a), Some(b)) = (catalog.tile(own), catalog.tile(other)) else {
        return false;
    };
    if a.is_stone && b.is_stone {
        return true;
    }
    let soil_or_grass =
        |id: u8, info: &stratum_catalog::TileInfo| info.is_grass || id == TILE_DIRT || id == TILE_MUD;
    soil_or_grass(own, a) && soil_or_grass(other, b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stratum_world::{Tile, SPRITE_NONE};

    fn grid_of(width: usize, height: usize, cells: &[(usize, usize, u8)]) -> TileGrid {
        let mut grid = TileGrid::with_capacity(width, height);
        grid.reset(width, height).unwrap();
        for &(x, y, type_id) in cells {
            *grid.tile_mut(x, y) = Tile {
                active: true,
                type_id,
                ..Tile::blank()
            };
        }
        grid
    }

    fn full_block(type_id: u8) -> TileGrid {
        let mut cells = Vec::new();
        for x in 0..3 {
            for y in 0..3 {
                cells.push((x, y, type_id));
            }
        }
        grid_of(3, 3, &cells)
    }

    #[test]
    fn test_fully_surrounded_selects_center_family() {
        let grid = full_block(1);
        let catalog = TileCatalog::builtin();
        // Family choice is deterministic regardless of the variant roll.
        for seed in 0..16 {
            let mut resolver = AutotileResolver::with_seed(seed);
            let (u, v) = resolver.resolve_tile(&grid, catalog, 1, 1);
            assert!(
                UV_CENTER.contains(&(u, v)),
                "seed {} gave ({}, {})",
                seed,
                u,
                v
            );
        }
    }

    #[test]
    fn test_missing_diagonals_select_open_families() {
        let catalog = TileCatalog::builtin();
        let mut resolver = AutotileResolver::with_seed(7);

        let mut grid = full_block(1);
        grid.tile_mut(0, 0).active = false;
        grid.tile_mut(2, 0).active = false;
        assert!(UV_OPEN_TOP.contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));

        let mut grid = full_block(1);
        grid.tile_mut(0, 2).active = false;
        grid.tile_mut(2, 2).active = false;
        assert!(UV_OPEN_BOTTOM.contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));

        let mut grid = full_block(1);
        grid.tile_mut(0, 0).active = false;
        grid.tile_mut(0, 2).active = false;
        assert!(UV_OPEN_LEFT.contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));

        let mut grid = full_block(1);
        grid.tile_mut(2, 0).active = false;
        grid.tile_mut(2, 2).active = false;
        assert!(UV_OPEN_RIGHT.contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));

        // One missing corner alone is not an open family.
        let mut grid = full_block(1);
        grid.tile_mut(0, 0).active = false;
        assert!(UV_CENTER.contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));
    }

    #[test]
    fn test_edge_mask_indexes_table() {
        let catalog = TileCatalog::builtin();
        let mut resolver = AutotileResolver::with_seed(3);
        // Tile with only an up neighbor.
        let grid = grid_of(3, 3, &[(1, 1, 1), (1, 0, 1)]);
        assert!(UV_EDGES[0b1000].contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));
        // Up and left.
        let grid = grid_of(3, 3, &[(1, 1, 1), (1, 0, 1), (0, 1, 1)]);
        assert!(UV_EDGES[0b1010].contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));
        // Isolated.
        let grid = grid_of(3, 3, &[(1, 1, 1)]);
        assert!(UV_EDGES[0b0000].contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));
    }

    #[test]
    fn test_seeded_resolution_is_reproducible() {
        let grid = full_block(1);
        let catalog = TileCatalog::builtin();
        let first = AutotileResolver::with_seed(42).resolve_tile(&grid, catalog, 1, 1);
        let second = AutotileResolver::with_seed(42).resolve_tile(&grid, catalog, 1, 1);
        assert_eq!(first, second);
    }

    #[test]
    fn test_torch_mounting() {
        let catalog = TileCatalog::builtin();
        let mut resolver = AutotileResolver::with_seed(0);
        // Floor below: free-standing.
        let grid = grid_of(3, 3, &[(1, 1, 4), (1, 2, 1)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (0, 0));
        // No floor, neighbor on the left: wall-mounted.
        let grid = grid_of(3, 3, &[(1, 1, 4), (0, 1, 1)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (22, 0));
        // Hanging in the open.
        let grid = grid_of(3, 3, &[(1, 1, 4)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (44, 0));
    }

    #[test]
    fn test_candles_are_single_sprites() {
        let catalog = TileCatalog::builtin();
        let mut resolver = AutotileResolver::with_seed(0);
        let grid = grid_of(3, 3, &[(1, 1, 33), (0, 1, 1), (2, 1, 1)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (0, 0));
    }

    #[test]
    fn test_platform_support_states() {
        let catalog = TileCatalog::builtin();
        let mut resolver = AutotileResolver::with_seed(0);
        // Platforms both sides.
        let grid = grid_of(3, 3, &[(0, 1, 19), (1, 1, 19), (2, 1, 19)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (0, 0));
        // Platform left, open right.
        let grid = grid_of(3, 3, &[(0, 1, 19), (1, 1, 19)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (18, 0));
        // Open left, platform right.
        let grid = grid_of(3, 3, &[(1, 1, 19), (2, 1, 19)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (36, 0));
        // Floating.
        let grid = grid_of(3, 3, &[(1, 1, 19)]);
        assert_eq!(resolver.resolve_tile(&grid, catalog, 1, 1), (54, 0));
    }

    #[test]
    fn test_soil_and_grass_interchange_for_matching() {
        let catalog = TileCatalog::builtin();
        let mut resolver = AutotileResolver::with_seed(9);
        // A grass tile ringed by dirt and mud joins in every direction.
        let mut cells = vec![(1, 1, 2u8)];
        for (x, y) in [(0, 0), (1, 0), (2, 0), (0, 1), (2, 1), (0, 2), (2, 2)] {
            cells.push((x, y, 0));
        }
        cells.push((1, 2, 59));
        let grid = grid_of(3, 3, &cells);
        assert!(UV_CENTER.contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));

        // Stone next to grass does not join.
        let grid = grid_of(3, 3, &[(1, 1, 1), (0, 1, 2)]);
        assert!(UV_EDGES[0b0000].contains(&resolver.resolve_tile(&grid, catalog, 1, 1)));
    }

    #[test]
    fn test_wall_mask_and_resolution_cache() {
        let catalog = TileCatalog::builtin();
        let mut grid = grid_of(3, 3, &[]);
        for x in 0..3 {
            for y in 0..3 {
                grid.tile_mut(x, y).wall = 4;
            }
        }
        let mut resolver = AutotileResolver::with_seed(5);
        let (u, v) = resolver.resolve_wall(&grid, 1, 1);
        assert!(UV_EDGES[0b1111].contains(&(u, v)));

        resolver.resolve_all(&mut grid, catalog);
        let frame = (grid.tile(1, 1).wall_u, grid.tile(1, 1).wall_v);
        assert_ne!(frame.0, SPRITE_NONE);
        // A second pass leaves resolved frames alone.
        let mut other = AutotileResolver::with_seed(99);
        other.resolve_all(&mut grid, catalog);
        assert_eq!((grid.tile(1, 1).wall_u, grid.tile(1, 1).wall_v), frame);
    }
}
