//! Versioned save-file decoder. Every field list after the leading format
//! version is gated on it; out-of-range ids are coerced and surfaced as one
//! aggregated warning, while a too-new version or a short stream is fatal.

use crate::entities::{Chest, ChestItem, Npc, Sign, CHEST_SLOTS};
use crate::error::{LoadWarning, WorldError};
use crate::grid::{TileGrid, WorldMeta};
use crate::tile::{Tile, SPRITE_NONE};
use stratum_catalog::TileCatalog;
use stratum_common::{Point, WireCursor};

/// Newest format this decoder understands.
pub const HIGHEST_VERSION: u32 = 39;

/// Format-version thresholds. Each constant names the first (or for
/// `V_LEGACY_LIT_LAST`, the last) version carrying the field it gates.
const V_ALTARS: u32 = 23;
const V_RLE: u32 = 25;
const V_LEGACY_LIT_LAST: u32 = 25;
const V_TORCH_FRAMES: u32 = 28;
const V_SAVED_NPCS: u32 = 29;
const V_CLOWN: u32 = 32;
const V_WIRE: u32 = 33;
const V_MECHANIC: u32 = 34;
const V_ITEM_PREFIX: u32 = 36;
const V_FROST: u32 = 37;
const V_ITEM_IDS: u32 = 38;

const TILE_TORCH: u8 = 4;
const TILE_TIMER: u8 = 144;

const CHEST_TABLE: usize = 1000;
const SIGN_TABLE: usize = 1000;

/// Everything a save holds besides the grid itself.
#[derive(Debug, Default)]
pub struct WorldContents {
    pub meta: WorldMeta,
    pub chests: Vec<Chest>,
    pub signs: Vec<Sign>,
    pub npcs: Vec<Npc>,
    pub warning: Option<LoadWarning>,
}

pub struct WorldFileReader<'a> {
    catalog: &'a TileCatalog,
}

impl<'a> WorldFileReader<'a> {
    pub fn new(catalog: &'a TileCatalog) -> Self {
        Self { catalog }
    }

    /// Decodes a complete save into `grid`, reporting fractional progress
    /// per column. The grid is reset to the file's dimensions first; on
    /// error its contents are unspecified and must not be published.
    pub fn read(
        &self,
        grid: &mut TileGrid,
        bytes: Vec<u8>,
        progress: &mut dyn FnMut(f32),
    ) -> Result<WorldContents, WorldError> {
        let mut cur = WireCursor::from_bytes(bytes);
        let mut warning = LoadWarning::default();

        let meta = self.read_header(&mut cur)?;
        grid.reset(meta.width as usize, meta.height as usize)?;
        self.read_tiles(&mut cur, grid, meta.version, &mut warning, progress)?;
        let chests = self.read_chests(&mut cur, meta.version)?;
        let signs = self.read_signs(&mut cur)?;
        let mut npcs = self.read_npcs(&mut cur)?;
        self.read_name_block(&mut cur, meta.version, &mut npcs)?;

        Ok(WorldContents {
            meta,
            chests,
            signs,
            npcs,
            warning: if warning.is_clean() { None } else { Some(warning) },
        })
    }

    fn read_header(&self, cur: &mut WireCursor) -> Result<WorldMeta, WorldError> {
        let version = cur.read_u32()?;
        if version > HIGHEST_VERSION {
            return Err(WorldError::UnsupportedVersion(version));
        }

        let mut meta = WorldMeta {
            version,
            title: cur.read_string()?,
            ..WorldMeta::default()
        };
        cur.skip(20)?; // world id + pixel bounds, unused here

        meta.height = cur.read_i32()?;
        meta.width = cur.read_i32()?;
        if meta.width <= 0 || meta.height <= 0 {
            return Err(WorldError::UnsupportedWorldSize {
                width: meta.width,
                height: meta.height,
            });
        }
        meta.spawn = Point::new(cur.read_i32()?, cur.read_i32()?);
        meta.ground_level = cur.read_f64()? as i32;
        meta.rock_level = cur.read_f64()? as i32;
        meta.game_time = cur.read_f64()?;
        meta.day_time = cur.read_bool()?;
        meta.moon_phase = cur.read_i32()?;
        meta.blood_moon = cur.read_bool()?;
        meta.dungeon = Point::new(cur.read_i32()?, cur.read_i32()?);
        meta.killed_boss_1 = cur.read_bool()?;
        meta.killed_boss_2 = cur.read_bool()?;
        meta.killed_boss_3 = cur.read_bool()?;
        if version >= V_SAVED_NPCS {
            meta.saved_tinkerer = cur.read_bool()?;
            meta.saved_wizard = cur.read_bool()?;
            if version >= V_MECHANIC {
                meta.saved_mechanic = cur.read_bool()?;
            }
            meta.killed_goblins = cur.read_bool()?;
            if version >= V_CLOWN {
                meta.killed_clown = cur.read_bool()?;
            }
            if version >= V_FROST {
                meta.killed_frost = cur.read_bool()?;
            }
        }
        meta.smashed_shadow_orb = cur.read_bool()?;
        meta.spawned_meteor = cur.read_bool()?;
        meta.shadow_orb_count = cur.read_u8()?;
        if version >= V_ALTARS {
            meta.altars_smashed = cur.read_i32()?;
            meta.hard_mode = cur.read_bool()?;
        }
        meta.invasion_delay = cur.read_i32()?;
        meta.invasion_size = cur.read_i32()?;
        meta.invasion_type = cur.read_i32()?;
        meta.invasion_x = cur.read_f64()?;
        Ok(meta)
    }

    fn read_tiles(
        &self,
        cur: &mut WireCursor,
        grid: &mut TileGrid,
        version: u32,
        warning: &mut LoadWarning,
        progress: &mut dyn FnMut(f32),
    ) -> Result<(), WorldError> {
        let width = grid.width();
        let height = grid.height();
        for x in 0..width {
            let mut y = 0;
            while y < height {
                let mut active = cur.read_bool()?;
                let mut type_id = 0u8;
                let mut u = SPRITE_NONE;
                let mut v = SPRITE_NONE;
                if active {
                    type_id = cur.read_u8()?;
                    if type_id as usize >= self.catalog.tile_count() {
                        warning.corrupt_tiles += 1;
                        active = false;
                        type_id = 0;
                    } else if self.catalog.tile(type_id).is_some_and(|t| t.has_extra) {
                        // Torches predate stored frames; timers always reset
                        // to the first row.
                        if !(version < V_TORCH_FRAMES && type_id == TILE_TORCH) {
                            u = cur.read_i16()?;
                            v = cur.read_i16()?;
                            if type_id == TILE_TIMER {
                                v = 0;
                            }
                        }
                    }
                }
                if version <= V_LEGACY_LIT_LAST {
                    cur.read_bool()?; // per-tile lit flag, recomputed instead
                }
                let mut wall = 0u8;
                if cur.read_bool()? {
                    wall = cur.read_u8()?;
                    if wall as usize >= self.catalog.wall_count() {
                        warning.corrupt_walls += 1;
                        wall = 0;
                    }
                }
                let mut liquid = 0u8;
                let mut lava = false;
                if cur.read_bool()? {
                    liquid = cur.read_u8()?;
                    lava = cur.read_bool()?;
                }
                let wire = if version >= V_WIRE { cur.read_bool()? } else { false };

                *grid.tile_mut(x, y) = Tile {
                    active,
                    type_id,
                    u,
                    v,
                    wall,
                    liquid,
                    lava,
                    wire,
                    ..Tile::blank()
                };

                let mut advance = 1;
                if version >= V_RLE {
                    let run = cur.read_u16()? as usize;
                    advance += grid.fill_run_down(x, y, run);
                }
                y += advance;
            }
            progress((x + 1) as f32 / width as f32);
        }
        Ok(())
    }

    fn read_chests(&self, cur: &mut WireCursor, version: u32) -> Result<Vec<Chest>, WorldError> {
        let mut chests = Vec::new();
        for _ in 0..CHEST_TABLE {
            if !cur.read_bool()? {
                continue;
            }
            let pos = Point::new(cur.read_i32()?, cur.read_i32()?);
            let mut items = Vec::new();
            for _ in 0..CHEST_SLOTS {
                let stack = cur.read_u8()?;
                if stack == 0 {
                    continue;
                }
                let name = if version >= V_ITEM_IDS {
                    self.catalog.item_name(cur.read_i32()?)
                } else {
                    cur.read_string()?
                };
                let prefix = if version >= V_ITEM_PREFIX { cur.read_u8()? } else { 0 };
                items.push(ChestItem {
                    stack,
                    name: self.catalog.apply_prefix(name, prefix),
                });
            }
            chests.push(Chest { pos, items });
        }
        Ok(chests)
    }

    fn read_signs(&self, cur: &mut WireCursor) -> Result<Vec<Sign>, WorldError> {
        let mut signs = Vec::new();
        for _ in 0..SIGN_TABLE {
            if !cur.read_bool()? {
                continue;
            }
            let text = cur.read_string()?;
            let pos = Point::new(cur.read_i32()?, cur.read_i32()?);
            signs.push(Sign { pos, text });
        }
        Ok(signs)
    }

    fn read_npcs(&self, cur: &mut WireCursor) -> Result<Vec<Npc>, WorldError> {
        let mut npcs = Vec::new();
        while cur.read_bool()? {
            let title = cur.read_string()?;
            let x = cur.read_f32()?;
            let y = cur.read_f32()?;
            let homeless = cur.read_bool()?;
            let home = Point::new(cur.read_i32()?, cur.read_i32()?);

            let mut npc = Npc::new(0, title);
            npc.x = x;
            npc.y = y;
            npc.homeless = homeless;
            npc.home = home;
            if let Some(friend) = self
                .catalog
                .friendly_npcs()
                .iter()
                .find(|friend| friend.name == npc.title)
            {
                npc.sprite = friend.sprite;
                npc.order = self.catalog.friendly_npc_order(friend.sprite);
            }
            npcs.push(npc);
        }
        Ok(npcs)
    }

    fn read_name_block(
        &self,
        cur: &mut WireCursor,
        version: u32,
        npcs: &mut [Npc],
    ) -> Result<(), WorldError> {
        for slot in 0..self.catalog.name_block_len(version) {
            let name = cur.read_string()?;
            if let Some(friend) = self.catalog.npc_for_name_slot(slot) {
                if let Some(npc) = npcs.iter_mut().find(|npc| npc.sprite == friend.sprite) {
                    npc.display_name = Some(name);
                }
            }
        }
        Ok(())
    }
}
