//! The immutable tile/wall catalog: per-id definitions, variant-override
//! trees, item and prefix tables, and the friendly-NPC roster. Loaded once
//! from an embedded JSON document; every other crate treats the catalog as
//! read-only shared data.

pub mod model;

use model::{CatalogDoc, TileDef, VariantDef};
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

const BUILTIN_JSON: &str = include_str!("../assets/catalog.json");

#[derive(Debug)]
pub enum CatalogError {
    Parse(serde_json::Error),
    Invalid(String),
}

impl fmt::Display for CatalogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogError::Parse(err) => write!(f, "catalog parse error: {}", err),
            CatalogError::Invalid(msg) => write!(f, "invalid catalog: {}", msg),
        }
    }
}

impl Error for CatalogError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CatalogError::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for CatalogError {
    fn from(err: serde_json::Error) -> Self {
        CatalogError::Parse(err)
    }
}

/// A variant-override node. Selectors with value −1 are unconstrained;
/// a node matches when every constrained selector is satisfied.
#[derive(Debug, Clone)]
pub struct Variant {
    pub u: i32,
    pub v: i32,
    pub minu: i32,
    pub maxu: i32,
    pub minv: i32,
    pub maxv: i32,
    pub name: Option<String>,
    pub color: Option<u32>,
    pub children: Vec<Variant>,
}

impl Variant {
    fn matches(&self, u: i16, v: i16) -> bool {
        let (u, v) = (u as i32, v as i32);
        (self.u < 0 || u == self.u)
            && (self.v < 0 || v == self.v)
            && (self.minu < 0 || u >= self.minu)
            && (self.maxu < 0 || u <= self.maxu)
            && (self.minv < 0 || v >= self.minv)
            && (self.maxv < 0 || v <= self.maxv)
    }
}

#[derive(Debug, Clone)]
pub struct TileInfo {
    pub id: u8,
    pub name: String,
    pub color: u32,
    pub has_extra: bool,
    pub transparent: bool,
    pub solid: bool,
    pub is_stone: bool,
    pub is_grass: bool,
    pub light: f32,
    pub light_r: f32,
    pub light_g: f32,
    pub light_b: f32,
    pub blend: Option<u8>,
    pub variants: Vec<Variant>,
}

impl TileInfo {
    fn placeholder(id: u8) -> Self {
        Self {
            id,
            name: format!("Tile #{}", id),
            color: 0x7F7F7F,
            has_extra: false,
            transparent: false,
            solid: true,
            is_stone: false,
            is_grass: false,
            light: 0.0,
            light_r: 0.0,
            light_g: 0.0,
            light_b: 0.0,
            blend: None,
            variants: Vec::new(),
        }
    }

    /// True when the tile emits any light of its own.
    pub fn emits_light(&self) -> bool {
        self.light > 0.0 || self.light_r > 0.0 || self.light_g > 0.0 || self.light_b > 0.0
    }
}

#[derive(Debug, Clone)]
pub struct WallInfo {
    pub id: u8,
    pub name: String,
    pub color: u32,
}

impl WallInfo {
    fn placeholder(id: u8) -> Self {
        Self {
            id,
            name: format!("Wall #{}", id),
            color: 0x505050,
        }
    }
}

/// Name and color of a tile after variant-override resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<'a> {
    pub name: &'a str,
    pub color: u32,
}

/// Global palette used by the compositor's depth bands and liquids.
#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub sky: u32,
    pub earth: u32,
    pub rock: u32,
    pub hell: u32,
    pub water: u32,
    pub lava: u32,
}

/// One town NPC the protocol and save loader can match by sprite id.
#[derive(Debug, Clone)]
pub struct FriendlyNpc {
    pub sprite: i16,
    pub name: String,
    /// Order in the trailing name block of a save; `None` for roster
    /// members without a name slot.
    pub name_slot: Option<usize>,
}

#[derive(Debug)]
pub struct TileCatalog {
    tiles: Vec<TileInfo>,
    walls: Vec<WallInfo>,
    items: HashMap<i32, String>,
    reforged: HashMap<i32, String>,
    prefixes: Vec<String>,
    npcs: Vec<FriendlyNpc>,
    palette: Palette,
}

static BUILTIN: Lazy<Arc<TileCatalog>> = Lazy::new(|| {
    Arc::new(TileCatalog::from_json(BUILTIN_JSON).expect("embedded catalog must parse"))
});

impl TileCatalog {
    /// The embedded default catalog, parsed on first use.
    pub fn builtin() -> &'static TileCatalog {
        &BUILTIN
    }

    /// A shared handle to the embedded catalog for owners that outlive a
    /// borrow, such as background load tasks.
    pub fn shared() -> Arc<TileCatalog> {
        Arc::clone(&BUILTIN)
    }

    /// Parses a catalog from an external JSON document; same schema as the
    /// embedded asset.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let doc: CatalogDoc = serde_json::from_str(json)?;
        Self::from_document(doc)
    }

    fn from_document(doc: CatalogDoc) -> Result<Self, CatalogError> {
        let max_tile = doc.tiles.iter().map(|t| t.id).max().unwrap_or(0);
        let mut tiles: Vec<TileInfo> =
            (0..=max_tile).map(TileInfo::placeholder).collect();
        for def in doc.tiles {
            let id = def.id;
            tiles[id as usize] = convert_tile(def)?;
        }

        let max_wall = doc.walls.iter().map(|w| w.id).max().unwrap_or(0);
        let mut walls: Vec<WallInfo> =
            (0..=max_wall).map(WallInfo::placeholder).collect();
        for def in doc.walls {
            walls[def.id as usize] = WallInfo {
                id: def.id,
                name: def.name,
                color: parse_color(&def.color)?,
            };
        }

        let mut items = HashMap::new();
        for def in doc.items {
            if def.id < 0 {
                return Err(CatalogError::Invalid(format!(
                    "primary item table holds negative id {}",
                    def.id
                )));
            }
            items.insert(def.id, def.name);
        }
        let mut reforged = HashMap::new();
        for def in doc.reforged {
            if def.id >= 0 {
                return Err(CatalogError::Invalid(format!(
                    "reforged item table holds non-negative id {}",
                    def.id
                )));
            }
            reforged.insert(def.id, def.name);
        }

        if !doc.prefixes.is_empty() && doc.prefixes.len() != 84 {
            return Err(CatalogError::Invalid(format!(
                "prefix table holds {} entries, expected 84",
                doc.prefixes.len()
            )));
        }

        let mut name_slot = 0;
        let npcs = doc
            .npcs
            .into_iter()
            .map(|def| {
                let slot = if def.named {
                    let s = name_slot;
                    name_slot += 1;
                    Some(s)
                } else {
                    None
                };
                FriendlyNpc {
                    sprite: def.sprite,
                    name: def.name,
                    name_slot: slot,
                }
            })
            .collect();

        Ok(Self {
            tiles,
            walls,
            items,
            reforged,
            prefixes: doc.prefixes,
            npcs,
            palette: Palette {
                sky: parse_color(&doc.globals.sky)?,
                earth: parse_color(&doc.globals.earth)?,
                rock: parse_color(&doc.globals.rock)?,
                hell: parse_color(&doc.globals.hell)?,
                water: parse_color(&doc.globals.water)?,
                lava: parse_color(&doc.globals.lava)?,
            },
        })
    }

    /// Number of known tile ids; any id at or past this is out of range.
    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }

    pub fn wall_count(&self) -> usize {
        self.walls.len()
    }

    pub fn tile(&self, id: u8) -> Option<&TileInfo> {
        self.tiles.get(id as usize)
    }

    pub fn wall(&self, id: u8) -> Option<&WallInfo> {
        self.walls.get(id as usize)
    }

    pub fn palette(&self) -> Palette {
        self.palette
    }

    /// Resolves a tile's display name and color through its variant tree.
    /// First matching node wins; children are consulted before the node's
    /// own overrides so the most specific constraint takes precedence.
    pub fn resolve(&self, id: u8, u: i16, v: i16) -> Resolved<'_> {
        let info = match self.tile(id) {
            Some(info) => info,
            None => {
                return Resolved {
                    name: "Unknown",
                    color: 0x7F7F7F,
                }
            }
        };
        let mut resolved = Resolved {
            name: &info.name,
            color: info.color,
        };
        if let Some((name, color)) = find_override(&info.variants, u, v) {
            if let Some(name) = name {
                resolved.name = name;
            }
            if let Some(color) = color {
                resolved.color = color;
            }
        }
        resolved
    }

    /// Resolves a chest item's display name from a catalog index. Negative
    /// indices address the reforged-tool table, positive the primary table.
    pub fn item_name(&self, id: i32) -> String {
        let table = if id < 0 { &self.reforged } else { &self.items };
        match table.get(&id) {
            Some(name) => name.clone(),
            None => format!("Item #{}", id),
        }
    }

    /// The adjective at `index` of the prefix table, if any.
    pub fn prefix_name(&self, index: u8) -> Option<&str> {
        self.prefixes.get(index as usize).map(String::as_str)
    }

    /// Applies an adjective prefix to an already-resolved item name.
    pub fn apply_prefix(&self, name: String, prefix: u8) -> String {
        match self.prefix_name(prefix) {
            Some(adjective) if prefix != 0 && !adjective.is_empty() => {
                format!("{} {}", adjective, name)
            }
            _ => name,
        }
    }

    /// Item name with its adjective prefix prepended when nonzero.
    pub fn prefixed_item_name(&self, id: i32, prefix: u8) -> String {
        self.apply_prefix(self.item_name(id), prefix)
    }

    pub fn friendly_npcs(&self) -> &[FriendlyNpc] {
        &self.npcs
    }

    /// Looks up a friendly NPC by its sprite id.
    pub fn friendly_npc(&self, sprite: i16) -> Option<&FriendlyNpc> {
        self.npcs.iter().find(|npc| npc.sprite == sprite)
    }

    /// Display order of a friendly NPC, or `None` for hostile sprites.
    pub fn friendly_npc_order(&self, sprite: i16) -> Option<usize> {
        self.npcs.iter().position(|npc| npc.sprite == sprite)
    }

    /// Number of entries the trailing name block of a save carries at the
    /// given format version.
    pub fn name_block_len(&self, version: u32) -> usize {
        if version < 31 {
            0
        } else {
            let slots = self.npcs.iter().filter(|npc| npc.name_slot.is_some()).count();
            if version >= 34 {
                slots
            } else {
                slots.saturating_sub(1)
            }
        }
    }

    /// The NPC whose name lives at `slot` in the trailing name block.
    pub fn npc_for_name_slot(&self, slot: usize) -> Option<&FriendlyNpc> {
        self.npcs.iter().find(|npc| npc.name_slot == Some(slot))
    }
}

fn find_override<'a>(
    nodes: &'a [Variant],
    u: i16,
    v: i16,
) -> Option<(Option<&'a str>, Option<u32>)> {
    for node in nodes {
        if node.matches(u, v) {
            let (mut name, mut color) = find_override(&node.children, u, v).unwrap_or((None, None));
            if name.is_none() {
                name = node.name.as_deref();
            }
            if color.is_none() {
                color = node.color;
            }
            return Some((name, color));
        }
    }
    None
}

fn convert_tile(def: TileDef) -> Result<TileInfo, CatalogError> {
    let [light_r, light_g, light_b] = def.light_rgb.unwrap_or([def.light; 3]);
    Ok(TileInfo {
        id: def.id,
        name: def.name,
        color: parse_color(&def.color)?,
        has_extra: def.has_extra,
        transparent: def.transparent,
        solid: def.solid,
        is_stone: def.is_stone,
        is_grass: def.is_grass,
        light: def.light,
        light_r,
        light_g,
        light_b,
        blend: def.blend,
        variants: def.variants.into_iter().map(convert_variant).collect::<Result<_, _>>()?,
    })
}

fn convert_variant(def: VariantDef) -> Result<Variant, CatalogError> {
    let color = match def.color {
        Some(hex) => Some(parse_color(&hex)?),
        None => None,
    };
    Ok(Variant {
        u: def.u,
        v: def.v,
        minu: def.minu,
        maxu: def.maxu,
        minv: def.minv,
        maxv: def.maxv,
        name: def.name,
        color,
        children: def.variants.into_iter().map(convert_variant).collect::<Result<_, _>>()?,
    })
}

fn parse_color(hex: &str) -> Result<u32, CatalogError> {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 {
        return Err(CatalogError::Invalid(format!("bad color literal {:?}", hex)));
    }
    u32::from_str_radix(digits, 16)
        .map_err(|_| CatalogError::Invalid(format!("bad color literal {:?}", hex)))
}
