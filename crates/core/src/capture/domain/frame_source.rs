use std::path::{Path, PathBuf};

use crate::shared::frame::Frame;

/// Properties of an opened frame source.
#[derive(Clone, Debug, PartialEq)]
pub struct SourceMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub total_frames: usize,
    pub source_path: Option<PathBuf>,
}

/// Delivers decoded frames at the source's own cadence.
///
/// Frames carry increasing indices and capture timestamps relative to the
/// start of the stream.
pub trait FrameSource: Send {
    fn open(&mut self, path: &Path) -> Result<SourceMetadata, Box<dyn std::error::Error>>;

    fn frames(
        &mut self,
    ) -> Box<dyn Iterator<Item = Result<Frame, Box<dyn std::error::Error>>> + '_>;

    fn close(&mut self);
}
