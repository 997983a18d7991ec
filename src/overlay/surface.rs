//! Overlay drawing surface.
//!
//! A plain RGBA buffer aligned 1:1 with the video frame. The renderer fully
//! clears and redraws it every tick; the surface carries no state between
//! passes beyond its pixel storage. Only the render loop writes to it.

use super::transform::SurfaceRect;

/// RGBA color, straight (non-premultiplied) alpha.
pub type Rgba = [u8; 4];

/// Outline color for person-class contacts.
pub const CONTACT_COLOR: Rgba = [0x00, 0xff, 0x41, 0xff];

/// Outline color for object-class contacts.
pub const ALERT_COLOR: Rgba = [0xff, 0x00, 0x00, 0xff];

pub struct OverlaySurface {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl OverlaySurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; (width as usize) * (height as usize) * 4],
        }
    }

    /// Match the surface to the currently displayed frame. Storage is only
    /// reallocated when the dimensions actually changed.
    pub fn resize_to(&mut self, width: u32, height: u32) {
        if width == self.width && height == self.height {
            return;
        }
        self.width = width;
        self.height = height;
        self.pixels = vec![0; (width as usize) * (height as usize) * 4];
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// True when the surface has no drawable area.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Full clear to transparent.
    pub fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn index(&self, x: u32, y: u32) -> usize {
        ((y as usize) * (self.width as usize) + x as usize) * 4
    }

    /// Write one pixel; coordinates outside the surface are discarded.
    pub(crate) fn put_pixel(&mut self, x: i64, y: i64, color: Rgba) {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return;
        }
        let i = self.index(x as u32, y as u32);
        self.pixels[i..i + 4].copy_from_slice(&color);
    }

    /// Read one pixel; out-of-bounds reads come back transparent.
    pub fn pixel(&self, x: u32, y: u32) -> Rgba {
        if x >= self.width || y >= self.height {
            return [0; 4];
        }
        let i = self.index(x, y);
        [
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ]
    }

    /// Filled rectangle, clipped to the surface.
    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, color: Rgba) {
        if w <= 0.0 || h <= 0.0 || self.is_empty() {
            return;
        }
        let x0 = (x.floor() as i64).max(0);
        let y0 = (y.floor() as i64).max(0);
        let x1 = ((x + w).ceil() as i64).min(self.width as i64);
        let y1 = ((y + h).ceil() as i64).min(self.height as i64);
        for py in y0..y1 {
            for px in x0..x1 {
                let i = self.index(px as u32, py as u32);
                self.pixels[i..i + 4].copy_from_slice(&color);
            }
        }
    }

    /// Rectangle outline with the given stroke width. A zero-area rectangle
    /// draws nothing.
    pub fn stroke_rect(&mut self, rect: SurfaceRect, color: Rgba, stroke: u32) {
        if rect.w <= 0.0 || rect.h <= 0.0 {
            return;
        }
        let s = stroke as f32;
        self.fill_rect(rect.x, rect.y, rect.w, s, color);
        self.fill_rect(rect.x, rect.y + rect.h - s, rect.w, s, color);
        self.fill_rect(rect.x, rect.y, s, rect.h, color);
        self.fill_rect(rect.x + rect.w - s, rect.y, s, rect.h, color);
    }

    /// Alpha-blend this overlay onto an RGB frame of the same dimensions.
    /// A dimension mismatch (the feed resized mid-pass) makes this a no-op;
    /// the next pass resizes and redraws.
    pub fn blend_onto(&self, rgb: &mut [u8], width: u32, height: u32) {
        if width != self.width || height != self.height {
            return;
        }
        if rgb.len() != (width as usize) * (height as usize) * 3 {
            return;
        }
        let count = (width as usize) * (height as usize);
        for p in 0..count {
            let a = self.pixels[p * 4 + 3] as u32;
            if a == 0 {
                continue;
            }
            for c in 0..3 {
                let over = self.pixels[p * 4 + c] as u32;
                let under = rgb[p * 3 + c] as u32;
                rgb[p * 3 + c] = ((over * a + under * (255 - a)) / 255) as u8;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resize_reallocates_only_on_change() {
        let mut surface = OverlaySurface::new(4, 4);
        surface.put_pixel(1, 1, CONTACT_COLOR);
        surface.resize_to(4, 4);
        // Same dimensions: contents untouched.
        assert_eq!(surface.pixel(1, 1), CONTACT_COLOR);
        surface.resize_to(8, 8);
        assert_eq!(surface.pixel(1, 1), [0; 4]);
    }

    #[test]
    fn clear_makes_everything_transparent() {
        let mut surface = OverlaySurface::new(4, 4);
        surface.fill_rect(0.0, 0.0, 4.0, 4.0, ALERT_COLOR);
        surface.clear();
        assert_eq!(surface.pixel(2, 2), [0; 4]);
    }

    #[test]
    fn stroke_hits_edges_not_interior() {
        let mut surface = OverlaySurface::new(20, 20);
        let rect = SurfaceRect {
            x: 2.0,
            y: 2.0,
            w: 10.0,
            h: 10.0,
        };
        surface.stroke_rect(rect, CONTACT_COLOR, 1);
        assert_eq!(surface.pixel(2, 2), CONTACT_COLOR);
        assert_eq!(surface.pixel(7, 2), CONTACT_COLOR);
        assert_eq!(surface.pixel(7, 7), [0; 4]);
    }

    #[test]
    fn zero_area_rect_draws_nothing() {
        let mut surface = OverlaySurface::new(8, 8);
        let rect = SurfaceRect {
            x: 3.0,
            y: 3.0,
            w: 0.0,
            h: 0.0,
        };
        surface.stroke_rect(rect, ALERT_COLOR, 2);
        for y in 0..8 {
            for x in 0..8 {
                assert_eq!(surface.pixel(x, y), [0; 4]);
            }
        }
    }

    #[test]
    fn drawing_clips_at_the_border() {
        let mut surface = OverlaySurface::new(4, 4);
        surface.fill_rect(-2.0, -2.0, 10.0, 10.0, ALERT_COLOR);
        surface.put_pixel(-1, 0, CONTACT_COLOR);
        surface.put_pixel(4, 4, CONTACT_COLOR);
        assert_eq!(surface.pixel(0, 0), ALERT_COLOR);
        assert_eq!(surface.pixel(3, 3), ALERT_COLOR);
    }

    #[test]
    fn blend_respects_alpha() {
        let mut surface = OverlaySurface::new(2, 1);
        surface.put_pixel(0, 0, [255, 0, 0, 255]);
        let mut rgb = vec![0u8; 2 * 3];
        surface.blend_onto(&mut rgb, 2, 1);
        assert_eq!(&rgb[0..3], &[255, 0, 0]);
        // Transparent overlay pixel leaves the frame untouched.
        assert_eq!(&rgb[3..6], &[0, 0, 0]);
    }

    #[test]
    fn blend_skips_mismatched_dimensions() {
        let surface = OverlaySurface::new(2, 2);
        let mut rgb = vec![7u8; 4 * 3];
        surface.blend_onto(&mut rgb, 4, 1);
        assert!(rgb.iter().all(|&b| b == 7));
    }
}
