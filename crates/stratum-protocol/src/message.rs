//! The message codec: decode for the fixed set of incoming types the map
//! sync consumes, encode for the small outgoing set. Every other type id on
//! the wire decodes to `Ignored` and is dropped by the session.

use crate::frame::{encode_frame, RawFrame};
use std::io;
use stratum_catalog::TileCatalog;
use stratum_common::WireCursor;
use stratum_world::{Tile, SPRITE_NONE};

/// Identity string sent in the greeting; servers speaking another revision
/// refuse it with an error message.
pub const PROTOCOL_IDENT: &str = "Terraria39";

pub mod type_id {
    pub const GREETING: u8 = 0x01;
    pub const DISCONNECT: u8 = 0x02;
    pub const APPROVED: u8 = 0x03;
    pub const PLAYER_INFO: u8 = 0x04;
    pub const REQUEST_WORLD_INFO: u8 = 0x06;
    pub const WORLD_INFO: u8 = 0x07;
    pub const REQUEST_INITIAL_TILES: u8 = 0x08;
    pub const STATUS: u8 = 0x09;
    pub const TILE_ROW: u8 = 0x0a;
    pub const RECALC_SECTION: u8 = 0x0b;
    pub const SPAWN_CONFIRM: u8 = 0x0c;
    pub const SECTION_REQUEST: u8 = 0x0d;
    pub const SET_LIFE: u8 = 0x10;
    pub const NPC_UPDATE: u8 = 0x17;
    pub const REQUEST_PASSWORD: u8 = 0x25;
    pub const PASSWORD: u8 = 0x26;
    pub const SET_MANA: u8 = 0x2a;
    pub const OKAY_TO_SPAWN: u8 = 0x31;
    pub const NPC_NAME: u8 = 0x38;
    pub const NPC_HOME: u8 = 0x3c;
}

const TILE_TIMER: u8 = 144;

mod cell_flag {
    pub const ACTIVE: u8 = 1;
    pub const LIT: u8 = 2; // legacy, carries no bytes
    pub const WALL: u8 = 4;
    pub const LIQUID: u8 = 8;
    pub const WIRE: u8 = 16;
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldInfo {
    pub time: i32,
    pub day_state: u8,
    pub moon_phase: u8,
    pub blood_moon: u8,
    pub width: i32,
    pub height: i32,
    pub spawn_x: i32,
    pub spawn_y: i32,
    pub ground_level: i32,
    pub rock_level: i32,
    pub world_id: i32,
    pub flags: u8,
    pub name: String,
}

/// One decoded cell of a tile row plus its run length.
#[derive(Debug, Clone, PartialEq)]
pub struct NetCell {
    pub tile: Tile,
    pub run: u16,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TileRow {
    pub width: u16,
    pub start_x: i32,
    pub y: i32,
    pub cells: Vec<NetCell>,
    /// Out-of-range ids coerced while decoding this row.
    pub corrupt: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NpcUpdate {
    pub slot: i16,
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    pub target: u8,
    pub ai: [f32; 4],
    pub sprite: i16,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Disconnect { reason: String },
    Approved { slot: u8 },
    WorldInfo(WorldInfo),
    Status { pending: i32, text: String },
    TileRow(TileRow),
    RecalcSection { x0: i16, y0: i16, x1: i16, y1: i16 },
    NpcUpdate(NpcUpdate),
    RequestPassword,
    OkayToSpawn,
    NpcName { slot: i16, name: String },
    NpcHome { slot: i16, x: i16, y: i16, homeless: bool },
    Ignored { type_id: u8 },
}

impl Message {
    /// Decodes one frame. Unknown type ids become `Ignored`; a known type
    /// with a short or malformed payload is an error that aborts the
    /// session.
    pub fn decode(frame: RawFrame, catalog: &TileCatalog) -> io::Result<Message> {
        let mut cur = WireCursor::from_bytes(frame.payload);
        let message = match frame.type_id {
            type_id::DISCONNECT => Message::Disconnect {
                reason: cur.read_string()?,
            },
            type_id::APPROVED => Message::Approved {
                slot: cur.read_u8()?,
            },
            type_id::WORLD_INFO => Message::WorldInfo(WorldInfo {
                time: cur.read_i32()?,
                day_state: cur.read_u8()?,
                moon_phase: cur.read_u8()?,
                blood_moon: cur.read_u8()?,
                width: cur.read_i32()?,
                height: cur.read_i32()?,
                spawn_x: cur.read_i32()?,
                spawn_y: cur.read_i32()?,
                ground_level: cur.read_i32()?,
                rock_level: cur.read_i32()?,
                world_id: cur.read_i32()?,
                flags: cur.read_u8()?,
                name: cur.read_string()?,
            }),
            type_id::STATUS => Message::Status {
                pending: cur.read_i32()?,
                text: cur.read_string()?,
            },
            type_id::TILE_ROW => Message::TileRow(decode_tile_row(&mut cur, catalog)?),
            type_id::RECALC_SECTION => Message::RecalcSection {
                x0: cur.read_i16()?,
                y0: cur.read_i16()?,
                x1: cur.read_i16()?,
                y1: cur.read_i16()?,
            },
            type_id::NPC_UPDATE => Message::NpcUpdate(NpcUpdate {
                slot: cur.read_i16()?,
                x: cur.read_f32()?,
                y: cur.read_f32()?,
                vx: cur.read_f32()?,
                vy: cur.read_f32()?,
                target: cur.read_u8()?,
                ai: [
                    cur.read_f32()?,
                    cur.read_f32()?,
                    cur.read_f32()?,
                    cur.read_f32()?,
                ],
                sprite: cur.read_i16()?,
            }),
            type_id::REQUEST_PASSWORD => Message::RequestPassword,
            type_id::OKAY_TO_SPAWN => Message::OkayToSpawn,
            type_id::NPC_NAME => Message::NpcName {
                slot: cur.read_i16()?,
                name: cur.read_string()?,
            },
            type_id::NPC_HOME => Message::NpcHome {
                slot: cur.read_i16()?,
                x: cur.read_i16()?,
                y: cur.read_i16()?,
                homeless: cur.read_bool()?,
            },
            other => Message::Ignored { type_id: other },
        };
        Ok(message)
    }
}

fn decode_tile_row(cur: &mut WireCursor, catalog: &TileCatalog) -> io::Result<TileRow> {
    let width = cur.read_u16()?;
    let start_x = cur.read_i32()?;
    let y = cur.read_i32()?;
    let mut cells = Vec::new();
    let mut corrupt = 0;
    let mut covered = 0usize;
    while covered < width as usize {
        let flags = cur.read_u8()?;
        let mut tile = Tile::blank();
        if flags & cell_flag::ACTIVE != 0 {
            tile.active = true;
            tile.type_id = cur.read_u8()?;
            if tile.type_id as usize >= catalog.tile_count() {
                corrupt += 1;
                tile.active = false;
                tile.type_id = 0;
            } else if catalog.tile(tile.type_id).is_some_and(|t| t.has_extra) {
                tile.u = cur.read_i16()?;
                tile.v = cur.read_i16()?;
                if tile.type_id == TILE_TIMER {
                    tile.v = 0;
                }
            } else {
                tile.u = SPRITE_NONE;
                tile.v = SPRITE_NONE;
            }
        }
        let _ = flags & cell_flag::LIT; // legacy bit, no payload
        if flags & cell_flag::WALL != 0 {
            tile.wall = cur.read_u8()?;
            if tile.wall as usize >= catalog.wall_count() {
                corrupt += 1;
                tile.wall = 0;
            }
        }
        if flags & cell_flag::LIQUID != 0 {
            tile.liquid = cur.read_u8()?;
            tile.lava = cur.read_bool()?;
        }
        tile.wire = flags & cell_flag::WIRE != 0;
        let run = cur.read_u16()?;
        covered += 1 + run as usize;
        cells.push(NetCell { tile, run });
    }
    Ok(TileRow {
        width,
        start_x,
        y,
        cells,
        corrupt,
    })
}

/// Client-to-server messages. A fixed, small set; each serializes into a
/// fresh length-prefixed frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Greeting,
    PlayerInfo { slot: u8, name: String },
    RequestWorldInfo,
    RequestInitialTiles { x: i32, y: i32 },
    SpawnConfirm { slot: u8, x: i32, y: i32 },
    SectionRequest { px: i32, py: i32 },
    SetLife { slot: u8 },
    SetMana { slot: u8 },
    Password { password: String },
}

impl Outgoing {
    pub fn type_id(&self) -> u8 {
        match self {
            Outgoing::Greeting => type_id::GREETING,
            Outgoing::PlayerInfo { .. } => type_id::PLAYER_INFO,
            Outgoing::RequestWorldInfo => type_id::REQUEST_WORLD_INFO,
            Outgoing::RequestInitialTiles { .. } => type_id::REQUEST_INITIAL_TILES,
            Outgoing::SpawnConfirm { .. } => type_id::SPAWN_CONFIRM,
            Outgoing::SectionRequest { .. } => type_id::SECTION_REQUEST,
            Outgoing::SetLife { .. } => type_id::SET_LIFE,
            Outgoing::SetMana { .. } => type_id::SET_MANA,
            Outgoing::Password { .. } => type_id::PASSWORD,
        }
    }

    /// Serializes into a complete frame, reusing `scratch` for the payload.
    pub fn encode(&self, scratch: &mut WireCursor) -> Vec<u8> {
        scratch.buffer.clear();
        match self {
            Outgoing::Greeting => {
                scratch.write_string(PROTOCOL_IDENT);
            }
            Outgoing::PlayerInfo { slot, name } => {
                scratch.write_u8(*slot);
                scratch.write_u8(0); // hair style
                scratch.write_bool(true); // male
                for _ in 0..5 {
                    // hair, skin, eye, shirt, pants color triples
                    scratch.write_u8(0x80);
                    scratch.write_u8(0x80);
                    scratch.write_u8(0x80);
                }
                scratch.write_string(name);
            }
            Outgoing::RequestWorldInfo => {}
            Outgoing::RequestInitialTiles { x, y } => {
                scratch.write_i32(*x);
                scratch.write_i32(*y);
            }
            Outgoing::SpawnConfirm { slot, x, y } => {
                scratch.write_u8(*slot);
                scratch.write_i32(*x);
                scratch.write_i32(*y);
            }
            Outgoing::SectionRequest { px, py } => {
                scratch.write_i32(*px);
                scratch.write_i32(*py);
            }
            Outgoing::SetLife { slot } => {
                scratch.write_u8(*slot);
                scratch.write_i16(400);
                scratch.write_i16(400);
            }
            Outgoing::SetMana { slot } => {
                scratch.write_u8(*slot);
                scratch.write_i16(20);
                scratch.write_i16(20);
            }
            Outgoing::Password { password } => {
                scratch.write_string(password);
            }
        }
        encode_frame(self.type_id(), &scratch.buffer)
    }
}
