//! Overlay rendering: coordinate transform, drawing surface, HUD glyphs and
//! the per-tick render pass.

mod font;
mod render;
mod surface;
mod transform;

pub use render::render_overlay;
pub use surface::{OverlaySurface, Rgba, ALERT_COLOR, CONTACT_COLOR};
pub use transform::{FrameScale, SurfaceRect};
