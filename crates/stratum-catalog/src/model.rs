//! Raw serde model for the catalog document. Converted into the immutable
//! in-memory tables by `TileCatalog::from_document`.

use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CatalogDoc {
    pub globals: GlobalsDef,
    pub tiles: Vec<TileDef>,
    pub walls: Vec<WallDef>,
    #[serde(default)]
    pub items: Vec<ItemDef>,
    #[serde(default)]
    pub reforged: Vec<ItemDef>,
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub npcs: Vec<NpcDef>,
}

#[derive(Debug, Deserialize)]
pub struct GlobalsDef {
    pub sky: String,
    pub earth: String,
    pub rock: String,
    pub hell: String,
    pub water: String,
    pub lava: String,
}

#[derive(Debug, Deserialize)]
pub struct TileDef {
    pub id: u8,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub has_extra: bool,
    #[serde(default)]
    pub transparent: bool,
    #[serde(default)]
    pub solid: bool,
    #[serde(default)]
    pub is_stone: bool,
    #[serde(default)]
    pub is_grass: bool,
    #[serde(default)]
    pub light: f32,
    #[serde(default)]
    pub light_rgb: Option<[f32; 3]>,
    #[serde(default)]
    pub blend: Option<u8>,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
}

#[derive(Debug, Deserialize)]
pub struct VariantDef {
    #[serde(default = "unconstrained")]
    pub u: i32,
    #[serde(default = "unconstrained")]
    pub v: i32,
    #[serde(default = "unconstrained")]
    pub minu: i32,
    #[serde(default = "unconstrained")]
    pub maxu: i32,
    #[serde(default = "unconstrained")]
    pub minv: i32,
    #[serde(default = "unconstrained")]
    pub maxv: i32,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantDef>,
}

fn unconstrained() -> i32 {
    -1
}

#[derive(Debug, Deserialize)]
pub struct WallDef {
    pub id: u8,
    pub name: String,
    pub color: String,
}

#[derive(Debug, Deserialize)]
pub struct ItemDef {
    pub id: i32,
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct NpcDef {
    pub sprite: i16,
    pub name: String,
    /// Whether the trailing name block of a save carries a slot for this NPC.
    #[serde(default = "default_true")]
    pub named: bool,
}

fn default_true() -> bool {
    true
}
