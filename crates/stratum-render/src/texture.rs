/// A decoded sprite sheet: tightly packed RGBA rows.
#[derive(Debug, Clone)]
pub struct Texture {
    pub width: usize,
    pub height: usize,
    pub rgba: Vec<u8>,
}

impl Texture {
    pub fn new(width: usize, height: usize, rgba: Vec<u8>) -> Self {
        assert_eq!(rgba.len(), width * height * 4, "texture byte length");
        Self { width, height, rgba }
    }

    /// A single-color sheet, handy for fixtures.
    pub fn solid(width: usize, height: usize, color: u32) -> Self {
        let mut rgba = Vec::with_capacity(width * height * 4);
        for _ in 0..width * height {
            rgba.extend_from_slice(&[
                (color >> 16) as u8,
                (color >> 8) as u8,
                color as u8,
                0xFF,
            ]);
        }
        Self { width, height, rgba }
    }

    /// RGBA of the pixel at (x, y), clamped to the sheet edges so short
    /// sheets repeat their last row the way liquid strips expect.
    pub fn pixel(&self, x: usize, y: usize) -> [u8; 4] {
        let x = x.min(self.width.saturating_sub(1));
        let y = y.min(self.height.saturating_sub(1));
        let at = (y * self.width + x) * 4;
        [
            self.rgba[at],
            self.rgba[at + 1],
            self.rgba[at + 2],
            self.rgba[at + 3],
        ]
    }
}

/// External texture-asset collaborator. Returning `None` anywhere is a
/// valid state; the compositor falls back to flat color for that element.
pub trait TextureSource {
    fn tile(&self, id: u8) -> Option<&Texture>;
    fn wall(&self, id: u8) -> Option<&Texture>;
    fn liquid(&self, lava: bool) -> Option<&Texture>;
    /// Tree crown sheet for a grass-family kind (0 = plain grass).
    fn tree_top(&self, kind: usize) -> Option<&Texture>;
    /// Tree branch sheet, left and right variants side by side.
    fn tree_branch(&self, kind: usize) -> Option<&Texture>;
    /// Giant mushroom cap sheet, three variants across.
    fn mushroom_cap(&self) -> Option<&Texture>;
}
