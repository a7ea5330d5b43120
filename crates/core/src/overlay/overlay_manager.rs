use crate::identity::identity_match::ResultBatch;
use crate::overlay::annotation_slot::AnnotationSlot;

/// Fixed pool of annotation slots updated from recognition results.
///
/// The pool is allocated once; applying a batch only rewrites slot state.
/// Slot `i` shows match `i` of the latest batch, and slots beyond the batch
/// length are hidden.
pub struct OverlayManager {
    slots: Vec<AnnotationSlot>,
    last_applied: Option<usize>,
}

impl OverlayManager {
    pub fn new(capacity: usize) -> Self {
        let capacity = if capacity == 0 {
            log::warn!("Overlay capacity of 0 requested; using 1");
            1
        } else {
            capacity
        };
        Self {
            slots: vec![AnnotationSlot::default(); capacity],
            last_applied: None,
        }
    }

    pub fn apply_results(&mut self, batch: &ResultBatch) {
        let shown = batch.len().min(self.slots.len());
        if batch.len() > shown {
            log::trace!(
                "Frame {}: {} faces exceed {} overlay slots",
                batch.frame_index,
                batch.len() - shown,
                self.slots.len()
            );
        }

        for (slot, m) in self.slots.iter_mut().zip(&batch.matches) {
            slot.show(m);
        }
        for slot in &mut self.slots[shown..] {
            slot.hide();
        }
        self.last_applied = Some(batch.frame_index);
    }

    pub fn slots(&self) -> &[AnnotationSlot] {
        &self.slots
    }

    pub fn visible_slots(&self) -> impl Iterator<Item = &AnnotationSlot> {
        self.slots.iter().filter(|s| s.is_visible())
    }

    pub fn visible_count(&self) -> usize {
        self.visible_slots().count()
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Hides every slot.
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            slot.hide();
        }
    }

    /// Frame index of the most recently applied batch.
    pub fn last_applied_frame(&self) -> Option<usize> {
        self.last_applied
    }
}
