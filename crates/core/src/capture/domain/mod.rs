pub mod display_surface;
pub mod frame_sink;
pub mod frame_source;
