use crate::overlay::annotation_slot::AnnotationSlot;
use crate::shared::frame::Frame;

/// Presents frames to the user.
///
/// The surface receives the current annotation slots with every frame and
/// decides how to draw them; only the visible slots carry meaning.
pub trait DisplaySurface: Send {
    fn present(
        &mut self,
        frame: &Frame,
        annotations: &[AnnotationSlot],
    ) -> Result<(), Box<dyn std::error::Error>>;
}
