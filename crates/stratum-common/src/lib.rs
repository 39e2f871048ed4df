pub mod cursor;
pub mod types;

pub use cursor::WireCursor;
pub use types::Point;

/// Edge length of one tile in screen pixels. Entity and section positions
/// on the wire are expressed in pixel space, grid positions in tile space.
pub const TILE_PIXELS: i32 = 16;
