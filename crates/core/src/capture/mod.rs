pub mod domain;
pub mod frame_source_adapter;
pub mod infrastructure;
