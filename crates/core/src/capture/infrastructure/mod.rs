pub mod annotated_image_surface;
pub mod image_sequence_source;
