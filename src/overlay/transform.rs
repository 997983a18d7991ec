//! Source-frame to surface coordinate transform.

use crate::telemetry::{DetectionBox, DEFAULT_FRAME_DIMS};

/// Axis-aligned rectangle in render-surface pixel space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Per-axis scale factors from source frame space to surface space.
///
/// Recomputed from the surface's current dimensions on every render pass.
/// The displayed feed can change resolution between ticks, so scale factors
/// are never cached across passes; stale factors drift the drawn boxes away
/// from the underlying image.
#[derive(Clone, Copy, Debug)]
pub struct FrameScale {
    sx: f32,
    sy: f32,
}

impl FrameScale {
    /// Build the transform for one render pass. Zero frame dimensions on
    /// either axis fall back to the capture default.
    pub fn new(surface_dims: (u32, u32), frame_dims: (u32, u32)) -> Self {
        let (fw, fh) = if frame_dims.0 == 0 || frame_dims.1 == 0 {
            DEFAULT_FRAME_DIMS
        } else {
            frame_dims
        };
        Self {
            sx: surface_dims.0 as f32 / fw as f32,
            sy: surface_dims.1 as f32 / fh as f32,
        }
    }

    /// Map a detection box into surface space. Width and height clamp to
    /// zero when the source coordinates are inverted, so degenerate boxes
    /// render as nothing instead of wrapping.
    pub fn apply(&self, bx: &DetectionBox) -> SurfaceRect {
        SurfaceRect {
            x: bx.x1 * self.sx,
            y: bx.y1 * self.sy,
            w: ((bx.x2 - bx.x1) * self.sx).max(0.0),
            h: ((bx.y2 - bx.y1) * self.sy).max(0.0),
        }
    }

    pub fn scale_x(&self) -> f32 {
        self.sx
    }

    pub fn scale_y(&self) -> f32 {
        self.sy
    }
}
