/// Sentinel sprite coordinate: the autotile resolver has not yet chosen a
/// frame for this cell.
pub const SPRITE_NONE: i16 = -1;

/// One grid cell. Foreground block, background wall, liquid, wire, and the
/// four quantized light channels all live side by side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tile {
    pub active: bool,
    pub type_id: u8,
    pub u: i16,
    pub v: i16,
    pub wall: u8,
    pub wall_u: i16,
    pub wall_v: i16,
    pub liquid: u8,
    pub lava: bool,
    pub wire: bool,
    pub light: u8,
    pub light_r: u8,
    pub light_g: u8,
    pub light_b: u8,
}

impl Tile {
    pub const fn blank() -> Self {
        Self {
            active: false,
            type_id: 0,
            u: SPRITE_NONE,
            v: SPRITE_NONE,
            wall: 0,
            wall_u: SPRITE_NONE,
            wall_v: SPRITE_NONE,
            liquid: 0,
            lava: false,
            wire: false,
            light: 0,
            light_r: 0,
            light_g: 0,
            light_b: 0,
        }
    }

    /// The copy written into run-length continuation cells: every field of
    /// the template except the wall sprite coordinates, which start over as
    /// unresolved.
    pub fn run_copy(&self) -> Self {
        Self {
            wall_u: SPRITE_NONE,
            wall_v: SPRITE_NONE,
            ..*self
        }
    }

    pub fn needs_sprite(&self) -> bool {
        self.u == SPRITE_NONE || self.v == SPRITE_NONE
    }

    pub fn needs_wall_sprite(&self) -> bool {
        self.wall_u == SPRITE_NONE || self.wall_v == SPRITE_NONE
    }

    /// Drops any resolved sprite frames so the autotile resolver recomputes
    /// them against current neighbors.
    pub fn invalidate_sprites(&mut self) {
        self.u = SPRITE_NONE;
        self.v = SPRITE_NONE;
        self.wall_u = SPRITE_NONE;
        self.wall_v = SPRITE_NONE;
    }

    pub fn light_scalar(&self) -> f32 {
        self.light as f32 / 255.0
    }

    pub fn light_rgb(&self) -> (f32, f32, f32) {
        (
            self.light_r as f32 / 255.0,
            self.light_g as f32 / 255.0,
            self.light_b as f32 / 255.0,
        )
    }

    pub fn has_any_light(&self) -> bool {
        self.light > 0 || self.light_r > 0 || self.light_g > 0 || self.light_b > 0
    }
}

impl Default for Tile {
    fn default() -> Self {
        Self::blank()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_copy_resets_wall_sprite_only() {
        let template = Tile {
            active: true,
            type_id: 30,
            u: 18,
            v: 36,
            wall: 4,
            wall_u: 54,
            wall_v: 18,
            liquid: 128,
            lava: true,
            wire: true,
            ..Tile::blank()
        };
        let copy = template.run_copy();
        assert_eq!(copy.wall_u, SPRITE_NONE);
        assert_eq!(copy.wall_v, SPRITE_NONE);
        assert_eq!(
            Tile {
                wall_u: template.wall_u,
                wall_v: template.wall_v,
                ..copy
            },
            template
        );
    }

    #[test]
    fn test_light_exposure_is_unit_range() {
        let mut tile = Tile::blank();
        tile.light = 255;
        tile.light_r = 51;
        assert_eq!(tile.light_scalar(), 1.0);
        assert_eq!(tile.light_rgb().0, 0.2);
    }
}
