//! Renders grid + lighting into an RGBA buffer at arbitrary pan/zoom.
//! Two paths: a flat per-pixel color map, and a textured path that blits
//! sprite sheets per cell when a texture provider is wired in.

use crate::texture::{Texture, TextureSource};
use stratum_catalog::{Palette, TileCatalog};
use stratum_world::{Tile, TileGrid, WorldMeta};

pub const MIN_ZOOM: f64 = 1.0;
pub const MAX_ZOOM: f64 = 16.0;

/// Highlight pulse climbs 0..7 and back down over this many ticks.
const PULSE_PERIOD: u32 = 14;

const TILE_TREE: u8 = 5;
const TILE_GIANT_MUSHROOM: u8 = 72;

/// How far below a trunk to look for the grass that decides its foliage.
const TRUNK_SCAN_LIMIT: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightMode {
    /// Fullbright.
    Off,
    /// Single scalar channel; unlit cells go black.
    Scalar,
    /// Per-channel RGB light.
    Rgb,
}

#[derive(Debug, Clone)]
pub struct ViewParams {
    /// Output size in pixels; the buffer stride is `width * 4`.
    pub width: usize,
    pub height: usize,
    /// Camera center in tile coordinates.
    pub center_x: f64,
    pub center_y: f64,
    /// Output pixels per tile, clamped to [1, 16].
    pub zoom: f64,
    pub light_mode: LightMode,
    pub textures_enabled: bool,
    /// Tile type pulsed with an overlay in the textured path.
    pub highlight: Option<u8>,
    /// Animation clock driving the highlight pulse.
    pub tick: u32,
}

pub struct Compositor<'a> {
    catalog: &'a TileCatalog,
    textures: Option<&'a dyn TextureSource>,
}

impl<'a> Compositor<'a> {
    pub fn new(catalog: &'a TileCatalog) -> Self {
        Self {
            catalog,
            textures: None,
        }
    }

    pub fn with_textures(catalog: &'a TileCatalog, textures: &'a dyn TextureSource) -> Self {
        Self {
            catalog,
            textures: Some(textures),
        }
    }

    /// Renders one frame. Deterministic for identical grid and view.
    pub fn render(&self, grid: &TileGrid, meta: &WorldMeta, view: &ViewParams, pixels: &mut [u8]) {
        assert_eq!(pixels.len(), view.width * view.height * 4, "buffer size");
        let zoom = view.zoom.clamp(MIN_ZOOM, MAX_ZOOM);
        match self.textures {
            Some(textures) if view.textures_enabled => {
                self.render_textured(grid, meta, view, zoom, textures, pixels)
            }
            _ => self.render_flat(grid, meta, view, zoom, pixels),
        }
    }

    fn render_flat(
        &self,
        grid: &TileGrid,
        meta: &WorldMeta,
        view: &ViewParams,
        zoom: f64,
        pixels: &mut [u8],
    ) {
        let palette = self.catalog.palette();
        let start_x = view.center_x - view.width as f64 / (2.0 * zoom);
        let start_y = view.center_y - view.height as f64 / (2.0 * zoom);

        for py in 0..view.height {
            let sy = (py as f64 / zoom + start_y).floor() as i64;
            let mut at = py * view.width * 4;
            for px in 0..view.width {
                let sx = (px as f64 / zoom + start_x).floor() as i64;
                let color = match grid.get(sx, sy) {
                    Some(tile) => {
                        self.flat_cell_color(tile, sy, grid.height(), meta, palette, view)
                    }
                    None => 0xFFFFFF,
                };
                pixels[at] = (color >> 16) as u8;
                pixels[at + 1] = (color >> 8) as u8;
                pixels[at + 2] = color as u8;
                pixels[at + 3] = 0xFF;
                at += 4;
            }
        }
    }

    fn flat_cell_color(
        &self,
        tile: &Tile,
        sy: i64,
        world_height: usize,
        meta: &WorldMeta,
        palette: Palette,
        view: &ViewParams,
    ) -> u32 {
        let mut color = band_color(sy, world_height, meta, palette);
        if tile.wall > 0 {
            if let Some(wall) = self.catalog.wall(tile.wall) {
                color = wall.color;
            }
        }
        if tile.active {
            color = self.catalog.resolve(tile.type_id, tile.u, tile.v).color;
        }
        if tile.liquid > 0 {
            let liquid = if tile.lava { palette.lava } else { palette.water };
            color = blend(color, liquid, 0.5);
        }
        match view.light_mode {
            LightMode::Off => color,
            LightMode::Scalar => blend(0, color, tile.light_scalar() as f64),
            LightMode::Rgb => {
                let (lr, lg, lb) = tile.light_rgb();
                let r = ((color >> 16) as u8 as f32 * lr) as u32;
                let g = ((color >> 8) as u8 as f32 * lg) as u32;
                let b = (color as u8 as f32 * lb) as u32;
                (r << 16) | (g << 8) | b
            }
        }
    }

    fn render_textured(
        &self,
        grid: &TileGrid,
        meta: &WorldMeta,
        view: &ViewParams,
        zoom: f64,
        textures: &dyn TextureSource,
        pixels: &mut [u8],
    ) {
        let palette = self.catalog.palette();
        let scale = zoom / 16.0;
        let start_x = view.center_x - view.width as f64 / (2.0 * zoom);
        let start_y = view.center_y - view.height as f64 / (2.0 * zoom);
        let first_x = start_x.floor() as i64;
        let first_y = start_y.floor() as i64;
        let shift_x = (start_x - start_x.floor()) * zoom;
        let shift_y = (start_y - start_y.floor()) * zoom;
        let cols = (view.width as f64 / zoom).ceil() as i64 + 2;
        let rows = (view.height as f64 / zoom).ceil() as i64 + 2;
        let block = zoom.ceil() as i64;

        let origin = |cx: i64, cy: i64| -> (i64, i64) {
            (
                ((cx - first_x) as f64 * zoom - shift_x).floor() as i64,
                ((cy - first_y) as f64 * zoom - shift_y).floor() as i64,
            )
        };

        // Depth bands in whole blocks.
        for cy in 0..rows {
            let sy = first_y + cy;
            for cx in 0..cols {
                let sx = first_x + cx;
                let Some(tile) = grid.get(sx, sy) else { continue };
                let light = self.cell_light(tile, view);
                let (dx, dy) = origin(sx, sy);
                let color = band_color(sy, grid.height(), meta, palette);
                fill_rect(pixels, view, dx, dy, block, block, color, light, 1.0);
            }
        }

        // Walls, offset half a block so seams land between tiles. Wall
        // sheets use doubled coordinates (32-pixel blocks).
        for cy in 0..rows {
            let sy = first_y + cy;
            for cx in 0..cols {
                let sx = first_x + cx;
                let Some(tile) = grid.get(sx, sy) else { continue };
                if tile.wall == 0 {
                    continue;
                }
                let light = self.cell_light(tile, view);
                let (dx, dy) = origin(sx, sy);
                let half = (zoom / 2.0) as i64;
                match textures.wall(tile.wall) {
                    Some(tex) => {
                        let wall_u = tile.wall_u.max(0) as usize * 2;
                        let wall_v = tile.wall_v.max(0) as usize * 2;
                        blit(
                            pixels, view, tex, wall_u, wall_v, 32, 32, dx - half, dy - half,
                            scale, light, 1.0,
                        );
                    }
                    None => {
                        let color = self.catalog.wall(tile.wall).map_or(0x505050, |w| w.color);
                        fill_rect(pixels, view, dx, dy, block, block, color, light, 1.0);
                    }
                }
            }
        }

        // Tiles.
        for cy in 0..rows {
            let sy = first_y + cy;
            for cx in 0..cols {
                let sx = first_x + cx;
                let Some(tile) = grid.get(sx, sy) else { continue };
                if tile.active {
                    let tile = *tile;
                    self.draw_tile(
                        grid,
                        view,
                        textures,
                        tile,
                        sx,
                        sy,
                        origin(sx, sy),
                        scale,
                        pixels,
                    );
                }
            }
        }

        // Liquid overlay, scaled by amount.
        for cy in 0..rows {
            let sy = first_y + cy;
            for cx in 0..cols {
                let sx = first_x + cx;
                let Some(tile) = grid.get(sx, sy) else { continue };
                if tile.liquid == 0 {
                    continue;
                }
                let solid = tile.active
                    && self
                        .catalog
                        .tile(tile.type_id)
                        .is_some_and(|info| info.solid);
                if solid {
                    continue;
                }
                let light = self.cell_light(tile, view);
                let (dx, dy) = origin(sx, sy);
                let level = ((255 - tile.liquid) / 16) as i64;
                let alpha = if tile.lava { 0.85 } else { 0.5 };
                let dy = dy + (level as f64 * scale) as i64;
                match textures.liquid(tile.lava) {
                    Some(tex) => {
                        blit(
                            pixels, view, tex, 0, 0, 16, (16 - level) as usize, dx, dy, scale,
                            light, alpha,
                        );
                    }
                    None => {
                        let palette = self.catalog.palette();
                        let color = if tile.lava { palette.lava } else { palette.water };
                        let height = ((16 - level) as f64 * scale).ceil() as i64;
                        fill_rect(pixels, view, dx, dy, block, height, color, light, alpha);
                    }
                }
            }
        }

        // Pulsing overlay for the highlighted type.
        if let Some(target) = view.highlight {
            let phase = view.tick % PULSE_PERIOD;
            let pulse = if phase <= 7 { phase } else { PULSE_PERIOD - phase };
            let alpha = pulse as f64 / 10.0;
            let base = self.catalog.resolve(target, 0, 0).color;
            let tint = if luminance(base) > 127 { 0x000000 } else { 0xFFFFFF };
            for cy in 0..rows {
                let sy = first_y + cy;
                for cx in 0..cols {
                    let sx = first_x + cx;
                    let Some(tile) = grid.get(sx, sy) else { continue };
                    if tile.active && tile.type_id == target {
                        let (dx, dy) = origin(sx, sy);
                        fill_rect(
                            pixels, view, dx, dy, block, block, tint,
                            (1.0, 1.0, 1.0), alpha,
                        );
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_tile(
        &self,
        grid: &TileGrid,
        view: &ViewParams,
        textures: &dyn TextureSource,
        tile: Tile,
        sx: i64,
        sy: i64,
        dest: (i64, i64),
        scale: f64,
        pixels: &mut [u8],
    ) {
        let light = self.cell_light(&tile, view);
        let (dx, dy) = dest;

        // Giant mushroom caps float above the stem frame that carries them.
        if tile.type_id == TILE_GIANT_MUSHROOM && tile.u >= 36 {
            if let Some(cap) = textures.mushroom_cap() {
                let variant = (tile.v / 18).clamp(0, 2) as usize;
                blit(
                    pixels,
                    view,
                    cap,
                    variant * 62,
                    0,
                    60,
                    42,
                    dx - (22.0 * scale) as i64,
                    dy - (26.0 * scale) as i64,
                    scale,
                    light,
                    1.0,
                );
            }
        }

        // Tree crowns and branches draw instead of the trunk for their
        // frames; the wood kind follows the grass the trunk stands in.
        if tile.type_id == TILE_TREE && tile.v >= 198 && (22..=66).contains(&tile.u) {
            let variant = match tile.v {
                220 => 1,
                242 => 2,
                _ => 0,
            };
            match tile.u {
                22 => {
                    let kind = self.foliage_kind(grid, sx, sy);
                    if let Some(tex) = textures.tree_top(kind) {
                        blit(
                            pixels,
                            view,
                            tex,
                            variant * 82,
                            0,
                            80,
                            80,
                            dx - (30.0 * scale) as i64,
                            dy - (62.0 * scale) as i64,
                            scale,
                            light,
                            1.0,
                        );
                    }
                }
                44 => {
                    let kind = self.foliage_kind(grid, sx + 1, sy);
                    if let Some(tex) = textures.tree_branch(kind) {
                        blit(
                            pixels,
                            view,
                            tex,
                            0,
                            variant * 42,
                            40,
                            40,
                            dx - (22.0 * scale) as i64,
                            dy - (12.0 * scale) as i64,
                            scale,
                            light,
                            1.0,
                        );
                    }
                }
                66 => {
                    let kind = self.foliage_kind(grid, sx - 1, sy);
                    if let Some(tex) = textures.tree_branch(kind) {
                        blit(
                            pixels,
                            view,
                            tex,
                            42,
                            variant * 42,
                            40,
                            40,
                            dx,
                            dy - (12.0 * scale) as i64,
                            scale,
                            light,
                            1.0,
                        );
                    }
                }
                _ => {}
            }
            return;
        }

        match textures.tile(tile.type_id) {
            Some(tex) => {
                let u = tile.u.max(0) as usize;
                let v = tile.v.max(0) as usize;
                blit(pixels, view, tex, u, v, 16, 16, dx, dy, scale, light, 1.0);
            }
            None => {
                let color = self.catalog.resolve(tile.type_id, tile.u, tile.v).color;
                let block = (scale * 16.0).ceil() as i64;
                fill_rect(pixels, view, dx, dy, block, block, color, light, 1.0);
            }
        }
    }

    /// Scans below a trunk for the nearest grass-family tile to pick the
    /// foliage sheet.
    fn foliage_kind(&self, grid: &TileGrid, x: i64, y: i64) -> usize {
        for step in 0..TRUNK_SCAN_LIMIT {
            let Some(tile) = grid.get(x, y + step as i64) else {
                break;
            };
            if tile.active
                && self
                    .catalog
                    .tile(tile.type_id)
                    .is_some_and(|info| info.is_grass)
            {
                return match tile.type_id {
                    2 => 0,
                    23 => 1,
                    60 => 2,
                    70 => 3,
                    109 => 4,
                    _ => 0,
                };
            }
        }
        0
    }

    fn cell_light(&self, tile: &Tile, view: &ViewParams) -> (f32, f32, f32) {
        match view.light_mode {
            LightMode::Off => (1.0, 1.0, 1.0),
            LightMode::Scalar => {
                let l = tile.light_scalar();
                (l, l, l)
            }
            LightMode::Rgb => tile.light_rgb(),
        }
    }
}

fn band_color(sy: i64, world_height: usize, meta: &WorldMeta, palette: Palette) -> u32 {
    if sy < meta.ground_level as i64 {
        palette.sky
    } else if sy < meta.rock_level as i64 {
        palette.earth
    } else {
        let span = world_height as i64 - meta.rock_level as i64;
        let fraction = if span <= 0 {
            0.0
        } else {
            (sy - meta.rock_level as i64) as f64 / span as f64
        };
        blend(palette.rock, palette.hell, fraction)
    }
}

fn blend(base: u32, over: u32, alpha: f64) -> u32 {
    let alpha = alpha.clamp(0.0, 1.0);
    let channel = |shift: u32| -> u32 {
        let a = ((base >> shift) & 0xFF) as f64;
        let b = ((over >> shift) & 0xFF) as f64;
        ((a + (b - a) * alpha) as u32) & 0xFF
    };
    (channel(16) << 16) | (channel(8) << 8) | channel(0)
}

fn luminance(color: u32) -> u32 {
    let r = (color >> 16) & 0xFF;
    let g = (color >> 8) & 0xFF;
    let b = color & 0xFF;
    (299 * r + 587 * g + 114 * b) / 1000
}

/// Fills a clipped rectangle, scaling by light and blending by alpha.
fn fill_rect(
    pixels: &mut [u8],
    view: &ViewParams,
    x0: i64,
    y0: i64,
    w: i64,
    h: i64,
    color: u32,
    light: (f32, f32, f32),
    alpha: f64,
) {
    let r = (((color >> 16) & 0xFF) as f32 * light.0) as u8;
    let g = (((color >> 8) & 0xFF) as f32 * light.1) as u8;
    let b = ((color & 0xFF) as f32 * light.2) as u8;
    for y in y0.max(0)..(y0 + h).min(view.height as i64) {
        for x in x0.max(0)..(x0 + w).min(view.width as i64) {
            let at = (y as usize * view.width + x as usize) * 4;
            if alpha >= 1.0 {
                pixels[at] = r;
                pixels[at + 1] = g;
                pixels[at + 2] = b;
            } else {
                pixels[at] = mix(pixels[at], r, alpha);
                pixels[at + 1] = mix(pixels[at + 1], g, alpha);
                pixels[at + 2] = mix(pixels[at + 2], b, alpha);
            }
            pixels[at + 3] = 0xFF;
        }
    }
}

fn mix(base: u8, over: u8, alpha: f64) -> u8 {
    (base as f64 + (over as f64 - base as f64) * alpha) as u8
}

/// Blits a sprite rectangle with clipping; fully transparent source pixels
/// are skipped, partially transparent ones blend.
#[allow(clippy::too_many_arguments)]
fn blit(
    pixels: &mut [u8],
    view: &ViewParams,
    tex: &Texture,
    src_x: usize,
    src_y: usize,
    src_w: usize,
    src_h: usize,
    dest_x: i64,
    dest_y: i64,
    scale: f64,
    light: (f32, f32, f32),
    alpha: f64,
) {
    let out_w = (src_w as f64 * scale).round() as i64;
    let out_h = (src_h as f64 * scale).round() as i64;
    for oy in 0..out_h {
        let y = dest_y + oy;
        if y < 0 || y >= view.height as i64 {
            continue;
        }
        let sy = src_y + (oy as f64 / scale) as usize;
        for ox in 0..out_w {
            let x = dest_x + ox;
            if x < 0 || x >= view.width as i64 {
                continue;
            }
            let sx = src_x + (ox as f64 / scale) as usize;
            let [r, g, b, a] = tex.pixel(sx, sy);
            if a == 0 {
                continue;
            }
            let r = (r as f32 * light.0) as u8;
            let g = (g as f32 * light.1) as u8;
            let b = (b as f32 * light.2) as u8;
            let at = (y as usize * view.width + x as usize) * 4;
            let pixel_alpha = alpha * (a as f64 / 255.0);
            if pixel_alpha >= 1.0 {
                pixels[at] = r;
                pixels[at + 1] = g;
                pixels[at + 2] = b;
            } else {
                pixels[at] = mix(pixels[at], r, pixel_alpha);
                pixels[at + 1] = mix(pixels[at + 1], g, pixel_alpha);
                pixels[at + 2] = mix(pixels[at + 2], b, pixel_alpha);
            }
            pixels[at + 3] = 0xFF;
        }
    }
}
