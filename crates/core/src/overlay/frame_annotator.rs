use std::sync::OnceLock;

use ab_glyph::{FontRef, PxScale};
use image::{ImageBuffer, Luma, LumaA, Pixel, Rgb, Rgba};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut};
use imageproc::rect::Rect;

use crate::overlay::annotation_slot::AnnotationSlot;
use crate::shared::frame::Frame;

/// Default outline thickness in pixels.
pub const DEFAULT_THICKNESS: u32 = 2;

/// Label glyph height in pixels.
pub const LABEL_SCALE: f32 = 24.0;

static LABEL_FONT_DATA: &[u8] = include_bytes!("../../assets/DejaVuSansMono.ttf");

/// Returns a copy of `frame` with every visible slot drawn in the slot's
/// color: the rectangle outline, and the label text starting at the slot's
/// label anchor. Drawing is clipped to the frame; the original frame is left
/// untouched.
///
/// Frames with fewer than three channels get the color's luma instead.
pub fn annotate(frame: &Frame, slots: &[AnnotationSlot], thickness: u32) -> Frame {
    let data = if frame.is_well_formed() {
        match frame.channels() {
            1 => draw_slots(frame, slots, thickness, |rgb| Luma([luma(rgb)])),
            2 => draw_slots(frame, slots, thickness, |rgb| LumaA([luma(rgb), 255])),
            3 => draw_slots(frame, slots, thickness, Rgb),
            4 => draw_slots(frame, slots, thickness, |[r, g, b]| Rgba([r, g, b, 255])),
            _ => frame.data().to_vec(),
        }
    } else {
        frame.data().to_vec()
    };

    Frame::new(data, frame.width(), frame.height(), frame.channels(), frame.index())
        .with_timestamp(frame.timestamp())
}

fn draw_slots<P>(
    frame: &Frame,
    slots: &[AnnotationSlot],
    thickness: u32,
    pixel: impl Fn([u8; 3]) -> P,
) -> Vec<u8>
where
    P: Pixel<Subpixel = u8>,
{
    let Some(mut img) =
        ImageBuffer::<P, Vec<u8>>::from_raw(frame.width(), frame.height(), frame.data().to_vec())
    else {
        return frame.data().to_vec();
    };
    let font = label_font();

    for slot in slots.iter().filter(|s| s.is_visible()) {
        let color = pixel(slot.color().rgb());
        let r = slot.rect();

        // Nested one-pixel outlines, growing inwards.
        for i in 0..thickness.max(1) as i32 {
            let (w, h) = (r.width - 2 * i, r.height - 2 * i);
            if w <= 0 || h <= 0 {
                break;
            }
            let rect = Rect::at(r.x + i, r.y + i).of_size(w as u32, h as u32);
            draw_hollow_rect_mut(&mut img, rect, color);
        }

        if let Some(font) = font {
            let (x, y) = slot.label_anchor();
            draw_text_mut(&mut img, color, x, y, PxScale::from(LABEL_SCALE), font, slot.label());
        }
    }
    img.into_raw()
}

fn label_font() -> Option<&'static FontRef<'static>> {
    static FONT: OnceLock<Option<FontRef<'static>>> = OnceLock::new();
    FONT.get_or_init(|| match FontRef::try_from_slice(LABEL_FONT_DATA) {
        Ok(font) => Some(font),
        Err(e) => {
            log::warn!("Label font could not be loaded, labels will not be drawn: {e}");
            None
        }
    })
    .as_ref()
}

fn luma([r, g, b]: [u8; 3]) -> u8 {
    (0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::identity_match::{IdentityMatch, ResultBatch};
    use crate::overlay::overlay_manager::OverlayManager;
    use crate::shared::region::DetectionRegion;
    use std::time::Duration;

    fn pixel(frame: &Frame, x: u32, y: u32) -> &[u8] {
        let c = frame.channels() as usize;
        let o = ((y * frame.width() + x) as usize) * c;
        &frame.data()[o..o + c]
    }

    fn overlay_with(regions: Vec<DetectionRegion>) -> OverlayManager {
        let mut overlay = OverlayManager::new(4);
        let matches = regions.into_iter().map(IdentityMatch::unknown).collect();
        overlay.apply_results(&ResultBatch::new(0, Duration::ZERO, matches));
        overlay
    }

    #[test]
    fn test_outline_drawn_interior_untouched() {
        let frame = Frame::new(vec![0u8; 20 * 20 * 3], 20, 20, 3, 5)
            .with_timestamp(Duration::from_millis(40));
        let overlay = overlay_with(vec![DetectionRegion::new(2, 2, 10, 10)]);

        let out = annotate(&frame, overlay.slots(), 1);

        assert_eq!(pixel(&out, 2, 2), [255, 0, 0]);
        assert_eq!(pixel(&out, 11, 11), [255, 0, 0]);
        assert_eq!(pixel(&out, 6, 6), [0, 0, 0]);
        assert_eq!(pixel(&out, 15, 0), [0, 0, 0]);
        assert_eq!(out.index(), 5);
        assert_eq!(out.timestamp(), Duration::from_millis(40));
        assert!(frame.data().iter().all(|&b| b == 0));
    }

    #[test]
    fn test_hidden_slots_not_drawn() {
        let frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        let mut overlay = overlay_with(vec![DetectionRegion::new(0, 0, 5, 5)]);
        overlay.clear();

        let out = annotate(&frame, overlay.slots(), 2);

        assert_eq!(out.data(), frame.data());
    }

    #[test]
    fn test_rect_partly_outside_is_clipped() {
        let frame = Frame::new(vec![0u8; 10 * 10 * 3], 10, 10, 3, 0);
        let overlay = overlay_with(vec![DetectionRegion::new(-5, 6, 20, 20)]);

        let out = annotate(&frame, overlay.slots(), 2);

        assert_eq!(pixel(&out, 0, 6), [255, 0, 0]);
        assert_eq!(pixel(&out, 9, 7), [255, 0, 0]);
        assert_eq!(pixel(&out, 5, 9), [0, 0, 0]);
    }

    #[test]
    fn test_grayscale_frame_uses_luma() {
        let frame = Frame::new(vec![0u8; 8 * 8], 8, 8, 1, 0);
        let overlay = overlay_with(vec![DetectionRegion::new(0, 0, 4, 4)]);

        let out = annotate(&frame, overlay.slots(), 1);

        assert_eq!(pixel(&out, 0, 0), [76]);
    }

    #[test]
    fn test_label_drawn_below_rect() {
        let frame = Frame::new(vec![0u8; 80 * 60 * 3], 80, 60, 3, 0);
        let overlay = overlay_with(vec![DetectionRegion::new(5, 5, 30, 20)]);
        let (_, anchor_y) = overlay.slots()[0].label_anchor();
        assert_eq!(anchor_y, 25);

        let out = annotate(&frame, overlay.slots(), 1);

        let label_pixels: Vec<&[u8]> = (25..60)
            .flat_map(|y| (0..80).map(move |x| (x, y)))
            .map(|(x, y)| pixel(&out, x, y))
            .filter(|p| p.iter().any(|&c| c > 0))
            .collect();
        assert!(!label_pixels.is_empty());
        assert!(label_pixels.iter().all(|p| p[1] == 0 && p[2] == 0));
        // Nothing written between the top of the frame and the outline.
        assert!((0..5).all(|y| (0..80).all(|x| pixel(&out, x, y) == [0, 0, 0])));
    }

    #[test]
    fn test_identified_label_uses_identified_color() {
        use crate::identity::identity_record::IdentityRecord;
        use std::sync::Arc;

        let frame = Frame::new(vec![0u8; 80 * 60 * 3], 80, 60, 3, 0);
        let record = Arc::new(IdentityRecord::new("Alice", vec![], vec![1.0]));
        let mut overlay = OverlayManager::new(1);
        overlay.apply_results(&ResultBatch::new(
            0,
            Duration::ZERO,
            vec![IdentityMatch::identified(DetectionRegion::new(5, 5, 30, 20), record, 0.9)],
        ));

        let out = annotate(&frame, overlay.slots(), 1);

        let below_box = (26..60).flat_map(|y| (0..80).map(move |x| (x, y)));
        let green = below_box
            .map(|(x, y)| pixel(&out, x, y))
            .filter(|p| p[1] > 0)
            .count();
        assert!(green > 0);
    }
}
