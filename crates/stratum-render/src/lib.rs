//! Rendering: neighbor-driven sprite resolution, the four-pass light
//! propagator, and the compositor that turns grid + view into RGBA pixels.

pub mod autotile;
pub mod compositor;
pub mod light;
pub mod texture;

pub use autotile::AutotileResolver;
pub use compositor::{Compositor, LightMode, ViewParams};
pub use light::LightPropagator;
pub use texture::{Texture, TextureSource};
