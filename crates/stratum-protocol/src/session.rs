//! Login/sync state machine. Pure with respect to IO: frames go in,
//! outgoing messages and a continue/finish verdict come out, and the
//! session exclusively owns the grid it populates until the caller takes
//! the finished world. The driver in `client` owns the socket.

use crate::error::NetError;
use crate::frame::RawFrame;
use crate::message::{Message, NpcUpdate, Outgoing, TileRow, WorldInfo};
use std::collections::HashMap;
use std::sync::Arc;
use stratum_catalog::TileCatalog;
use stratum_common::{Point, TILE_PIXELS};
use stratum_logger::{log, LogSeverity};
use stratum_world::reader::WorldContents;
use stratum_world::{LoadWarning, LoadedWorld, Npc, TileGrid, WorldMeta};

/// World transfer is paginated in fixed sections of this many tiles.
pub const SECTION_WIDTH: usize = 200;
pub const SECTION_HEIGHT: usize = 150;

/// Worlds past either bound are refused a full sync: the header is shown
/// but the section-fetch loop never starts. Policy, not an error.
pub const MAX_SYNC_WIDTH: i32 = 4200;
pub const MAX_SYNC_HEIGHT: i32 = 1200;

#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub player_name: String,
    pub password: Option<String>,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            player_name: "Observer".to_owned(),
            password: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginLevel {
    Disconnected,
    AwaitingApproval,
    AwaitingWorldInfo,
    ReceivingTiles,
    Spawned,
}

/// Why the session wants the connection closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disconnection {
    /// Every section is received; the map is complete.
    MapComplete,
    /// Policy refusal of an oversized world.
    WorldTooLarge { width: i32, height: i32 },
}

/// Verdict of one handled frame.
#[derive(Debug)]
pub enum SessionEvent {
    /// Send these and keep pumping.
    Continue(Vec<Outgoing>),
    /// Send these, then close the socket.
    Finished {
        actions: Vec<Outgoing>,
        reason: Disconnection,
    },
}

/// Per-section received bitmap, scanned row-major for the next fetch.
struct SectionBitmap {
    cols: usize,
    rows: usize,
    received: Vec<bool>,
}

impl SectionBitmap {
    fn new(width: usize, height: usize) -> Self {
        let cols = width.div_ceil(SECTION_WIDTH);
        let rows = height.div_ceil(SECTION_HEIGHT);
        Self {
            cols,
            rows,
            received: vec![false; cols * rows],
        }
    }

    fn mark(&mut self, col: i64, row: i64) {
        if col >= 0 && row >= 0 && (col as usize) < self.cols && (row as usize) < self.rows {
            self.received[row as usize * self.cols + col as usize] = true;
        }
    }

    fn first_missing(&self) -> Option<(usize, usize)> {
        for row in 0..self.rows {
            for col in 0..self.cols {
                if !self.received[row * self.cols + col] {
                    return Some((col, row));
                }
            }
        }
        None
    }

    fn received_count(&self) -> usize {
        self.received.iter().filter(|r| **r).count()
    }

    fn total(&self) -> usize {
        self.received.len()
    }
}

pub struct SyncSession {
    catalog: Arc<TileCatalog>,
    options: SyncOptions,
    level: LoginLevel,
    slot: u8,
    grid: TileGrid,
    meta: WorldMeta,
    npcs: Vec<Npc>,
    npc_slots: HashMap<i16, usize>,
    bitmap: Option<SectionBitmap>,
    warning: LoadWarning,
    status: String,
    camera: Point,
}

impl SyncSession {
    pub fn new(catalog: Arc<TileCatalog>, options: SyncOptions, grid: TileGrid) -> Self {
        Self {
            catalog,
            options,
            level: LoginLevel::Disconnected,
            slot: 0,
            grid,
            meta: WorldMeta::default(),
            npcs: Vec::new(),
            npc_slots: HashMap::new(),
            bitmap: None,
            warning: LoadWarning::default(),
            status: String::new(),
            camera: Point::default(),
        }
    }

    pub fn level(&self) -> LoginLevel {
        self.level
    }

    /// Latest server status line, for a progress display.
    pub fn status(&self) -> &str {
        &self.status
    }

    /// Where the view should center once spawned.
    pub fn camera(&self) -> Point {
        self.camera
    }

    /// Fraction of sections received, 0.0 before the world header arrives.
    pub fn progress(&self) -> f32 {
        match &self.bitmap {
            Some(bitmap) if bitmap.total() > 0 => {
                bitmap.received_count() as f32 / bitmap.total() as f32
            }
            _ => 0.0,
        }
    }

    /// Opening move after the socket connects.
    pub fn greet(&mut self) -> Vec<Outgoing> {
        self.level = LoginLevel::AwaitingApproval;
        vec![Outgoing::Greeting]
    }

    pub fn handle(&mut self, frame: RawFrame) -> Result<SessionEvent, NetError> {
        let message = Message::decode(frame, &self.catalog)
            .map_err(|err| NetError::Protocol(err.to_string()))?;
        match message {
            Message::Disconnect { reason } => Err(NetError::Rejected(reason)),
            Message::Approved { slot } => {
                self.slot = slot;
                self.level = LoginLevel::AwaitingWorldInfo;
                Ok(SessionEvent::Continue(vec![
                    Outgoing::PlayerInfo {
                        slot,
                        name: self.options.player_name.clone(),
                    },
                    Outgoing::SetLife { slot },
                    Outgoing::SetMana { slot },
                    Outgoing::RequestWorldInfo,
                ]))
            }
            Message::WorldInfo(info) => self.on_world_info(info),
            Message::Status { text, .. } => {
                self.status = text;
                Ok(SessionEvent::Continue(Vec::new()))
            }
            Message::TileRow(row) => {
                self.apply_tile_row(row);
                Ok(SessionEvent::Continue(Vec::new()))
            }
            Message::RecalcSection { x0, y0, x1, y1 } => {
                self.on_recalc_section(x0, y0, x1, y1)
            }
            Message::OkayToSpawn => self.on_okay_to_spawn(),
            Message::RequestPassword => match &self.options.password {
                Some(password) => Ok(SessionEvent::Continue(vec![Outgoing::Password {
                    password: password.clone(),
                }])),
                None => Err(NetError::PasswordRequired),
            },
            Message::NpcUpdate(update) => {
                self.on_npc_update(update);
                Ok(SessionEvent::Continue(Vec::new()))
            }
            Message::NpcName { slot, name } => {
                if let Some(&index) = self.npc_slots.get(&slot) {
                    self.npcs[index].display_name = Some(name);
                }
                Ok(SessionEvent::Continue(Vec::new()))
            }
            Message::NpcHome { slot, x, y, homeless } => {
                if let Some(&index) = self.npc_slots.get(&slot) {
                    let npc = &mut self.npcs[index];
                    npc.home = Point::new(x as i32, y as i32);
                    npc.homeless = homeless;
                }
                Ok(SessionEvent::Continue(Vec::new()))
            }
            Message::Ignored { .. } => Ok(SessionEvent::Continue(Vec::new())),
        }
    }

    /// The finished world. Only meaningful after `MapComplete`.
    pub fn into_world(self) -> LoadedWorld {
        LoadedWorld {
            grid: self.grid,
            contents: WorldContents {
                meta: self.meta,
                chests: Vec::new(),
                signs: Vec::new(),
                npcs: self.npcs,
                warning: if self.warning.is_clean() {
                    None
                } else {
                    Some(self.warning)
                },
            },
        }
    }

    /// Returns just the grid, for the refusal path where nothing loaded.
    pub fn into_grid(self) -> TileGrid {
        self.grid
    }

    /// Read-only view of the grid being populated.
    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }

    fn on_world_info(&mut self, info: WorldInfo) -> Result<SessionEvent, NetError> {
        self.grid
            .reset(info.width.max(0) as usize, info.height.max(0) as usize)?;
        self.bitmap = Some(SectionBitmap::new(
            info.width.max(0) as usize,
            info.height.max(0) as usize,
        ));
        self.meta = WorldMeta {
            title: info.name,
            width: info.width,
            height: info.height,
            spawn: Point::new(info.spawn_x, info.spawn_y),
            ground_level: info.ground_level,
            rock_level: info.rock_level,
            day_time: info.day_state != 0,
            moon_phase: info.moon_phase as i32,
            blood_moon: info.blood_moon != 0,
            hard_mode: info.flags & 0x04 != 0,
            ..WorldMeta::default()
        };
        self.level = LoginLevel::ReceivingTiles;
        log(
            format!(
                "world \"{}\" is {}x{}",
                self.meta.title, self.meta.width, self.meta.height
            ),
            LogSeverity::Info,
        );
        Ok(SessionEvent::Continue(vec![Outgoing::RequestInitialTiles {
            x: self.meta.spawn.x,
            y: self.meta.spawn.y,
        }]))
    }

    fn on_recalc_section(
        &mut self,
        x0: i16,
        y0: i16,
        x1: i16,
        y1: i16,
    ) -> Result<SessionEvent, NetError> {
        if let Some(bitmap) = &mut self.bitmap {
            for row in y0..=y1 {
                for col in x0..=x1 {
                    bitmap.mark(col as i64, row as i64);
                }
            }
        }
        // Sprite frames in the covered range were resolved against missing
        // neighbors; force a fresh autotile pass over the whole span.
        let x0 = (x0.max(0) as usize) * SECTION_WIDTH;
        let y0 = (y0.max(0) as usize) * SECTION_HEIGHT;
        let x1 = (x1.max(0) as usize + 1) * SECTION_WIDTH - 1;
        let y1 = (y1.max(0) as usize + 1) * SECTION_HEIGHT - 1;
        self.grid.invalidate_sprites_in(x0, y0, x1, y1);

        if self.level == LoginLevel::Spawned {
            Ok(self.advance_section_fetch(Vec::new()))
        } else {
            Ok(SessionEvent::Continue(Vec::new()))
        }
    }

    fn on_okay_to_spawn(&mut self) -> Result<SessionEvent, NetError> {
        if self.meta.width > MAX_SYNC_WIDTH || self.meta.height > MAX_SYNC_HEIGHT {
            log(
                format!(
                    "refusing to sync {}x{} world, over the {}x{} limit",
                    self.meta.width, self.meta.height, MAX_SYNC_WIDTH, MAX_SYNC_HEIGHT
                ),
                LogSeverity::Warning,
            );
            return Ok(SessionEvent::Finished {
                actions: Vec::new(),
                reason: Disconnection::WorldTooLarge {
                    width: self.meta.width,
                    height: self.meta.height,
                },
            });
        }
        self.camera = self.meta.spawn;
        self.level = LoginLevel::Spawned;
        let actions = vec![Outgoing::SpawnConfirm {
            slot: self.slot,
            x: self.meta.spawn.x,
            y: self.meta.spawn.y,
        }];
        Ok(self.advance_section_fetch(actions))
    }

    /// Requests the first unfetched section, or finishes when none remain.
    fn advance_section_fetch(&mut self, mut actions: Vec<Outgoing>) -> SessionEvent {
        let next = self.bitmap.as_ref().and_then(SectionBitmap::first_missing);
        match next {
            Some((col, row)) => {
                actions.push(Outgoing::SectionRequest {
                    px: (col * SECTION_WIDTH) as i32 * TILE_PIXELS,
                    py: (row * SECTION_HEIGHT) as i32 * TILE_PIXELS,
                });
                SessionEvent::Continue(actions)
            }
            None => SessionEvent::Finished {
                actions,
                reason: Disconnection::MapComplete,
            },
        }
    }

    fn apply_tile_row(&mut self, row: TileRow) {
        self.warning.corrupt_tiles += row.corrupt;
        let y = row.y as i64;
        let mut x = row.start_x as i64;
        for cell in row.cells {
            if self.grid.in_bounds(x, y) {
                *self.grid.tile_mut(x as usize, y as usize) = cell.tile;
                self.grid
                    .fill_run_right(x as usize, y as usize, cell.run as usize);
            }
            x += 1 + cell.run as i64;
        }
    }

    fn on_npc_update(&mut self, update: NpcUpdate) {
        match self.npc_slots.get(&update.slot) {
            Some(&index) => {
                let npc = &mut self.npcs[index];
                npc.x = update.x;
                npc.y = update.y;
                npc.sprite = update.sprite;
            }
            None => {
                // A new slot only becomes an entry if the sprite is a town
                // NPC; everything else wandering the world is noise here.
                if let Some(friend) = self.catalog.friendly_npc(update.sprite) {
                    let mut npc = Npc::new(update.sprite, friend.name.clone());
                    npc.x = update.x;
                    npc.y = update.y;
                    npc.order = self.catalog.friendly_npc_order(update.sprite);
                    self.npc_slots.insert(update.slot, self.npcs.len());
                    self.npcs.push(npc);
                }
            }
        }
    }
}
