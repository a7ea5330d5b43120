use crate::identity::identity_match::{IdentityMatch, MatchOutcome};
use crate::shared::constants::UNKNOWN_LABEL;
use crate::shared::region::DetectionRegion;

/// Color state of an annotation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotColor {
    /// Face matched a registered identity.
    Identified,
    /// Face is unknown.
    #[default]
    Warning,
}

impl SlotColor {
    pub fn rgb(self) -> [u8; 3] {
        match self {
            SlotColor::Identified => [0, 255, 0],
            SlotColor::Warning => [255, 0, 0],
        }
    }
}

/// One reusable overlay element: a rectangle with a label.
///
/// Slots are owned by the [`OverlayManager`](super::overlay_manager::OverlayManager)
/// and only change through it. An invisible slot keeps its last geometry.
#[derive(Clone, Debug, PartialEq)]
pub struct AnnotationSlot {
    visible: bool,
    rect: DetectionRegion,
    label: String,
    color: SlotColor,
}

impl Default for AnnotationSlot {
    fn default() -> Self {
        Self {
            visible: false,
            rect: DetectionRegion::new(0, 0, 0, 0),
            label: String::new(),
            color: SlotColor::default(),
        }
    }
}

impl AnnotationSlot {
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn rect(&self) -> &DetectionRegion {
        &self.rect
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn color(&self) -> SlotColor {
        self.color
    }

    /// Where the label is drawn: the left/bottom corner of the rectangle.
    pub fn label_anchor(&self) -> (i32, i32) {
        (self.rect.x, self.rect.bottom())
    }

    pub(crate) fn show(&mut self, m: &IdentityMatch) {
        self.rect.clone_from(&m.region);
        self.label.clear();
        match &m.outcome {
            MatchOutcome::Identified { record, .. } => {
                self.color = SlotColor::Identified;
                self.label.push_str(record.label());
                for (i, aux) in record.aux().iter().enumerate() {
                    self.label.push_str(if i == 0 { " (" } else { ", " });
                    self.label.push_str(aux);
                }
                if !record.aux().is_empty() {
                    self.label.push(')');
                }
            }
            MatchOutcome::Unknown => {
                self.color = SlotColor::Warning;
                self.label.push_str(UNKNOWN_LABEL);
            }
        }
        self.visible = true;
    }

    pub(crate) fn hide(&mut self) {
        self.visible = false;
    }
}
