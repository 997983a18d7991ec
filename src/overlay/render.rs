//! Per-tick overlay render pass.

use crate::classify::{self, ContactClass};
use crate::telemetry::DetectionMessage;

use super::font;
use super::surface::{OverlaySurface, Rgba, ALERT_COLOR, CONTACT_COLOR};
use super::transform::FrameScale;

/// Outline stroke width in surface pixels.
const STROKE_WIDTH: u32 = 2;
/// Height of the filled label bar above each box.
const LABEL_BAR_HEIGHT: f32 = 15.0;
/// Horizontal padding between the bar edge and the label text.
const LABEL_PAD: f32 = 5.0;
/// Alpha of the label bar (the outline color at ~80%).
const LABEL_BG_ALPHA: u8 = 0xcc;
const LABEL_TEXT_COLOR: Rgba = [0x00, 0x00, 0x00, 0xff];

/// Paint one telemetry tick onto the overlay.
///
/// The whole surface is cleared and redrawn; rendering is a pure function of
/// the latest message and the surface's current size. A zero-area surface
/// (the feed is not up yet) makes the pass a no-op, retried naturally on the
/// next tick. Boxes failing the display gate are skipped; the displayed
/// counts are unaffected either way.
pub fn render_overlay(msg: &DetectionMessage, surface: &mut OverlaySurface) {
    if surface.is_empty() {
        return;
    }
    surface.clear();

    let scale = FrameScale::new((surface.width(), surface.height()), msg.source_dims());

    for bx in &msg.boxes {
        let Some(class) = classify::displayable(bx) else {
            continue;
        };
        let color = match class {
            ContactClass::Person => CONTACT_COLOR,
            ContactClass::Object => ALERT_COLOR,
        };

        let rect = scale.apply(bx);
        surface.stroke_rect(rect, color, STROKE_WIDTH);

        // Label bar directly above the box top edge. The text arrives
        // pre-formatted from the backend; only the case is normalized.
        let label = bx.label.to_uppercase();
        let text_w = font::text_width(&label) as f32;
        let mut bar = color;
        bar[3] = LABEL_BG_ALPHA;
        surface.fill_rect(
            rect.x,
            rect.y - LABEL_BAR_HEIGHT,
            text_w + 2.0 * LABEL_PAD,
            LABEL_BAR_HEIGHT,
            bar,
        );
        font::draw_line(
            surface,
            (rect.x + LABEL_PAD) as i64,
            (rect.y - LABEL_BAR_HEIGHT + 4.0) as i64,
            &label,
            LABEL_TEXT_COLOR,
        );
    }
}
