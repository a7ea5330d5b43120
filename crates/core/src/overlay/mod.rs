pub mod annotation_slot;
pub mod frame_annotator;
pub mod overlay_manager;
