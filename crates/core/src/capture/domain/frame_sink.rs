use thiserror::Error;

use crate::shared::frame::Frame;

/// Why a presented frame was not handed to the recognition worker.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameRejected {
    #[error("frame is empty or its buffer does not match its dimensions")]
    Malformed,
    #[error("no recognition worker is attached")]
    Detached,
    #[error("detect interval has not elapsed since the last accepted frame")]
    Throttled,
    #[error("a frame is already being analysed")]
    Busy,
}

/// Receives frames for analysis.
///
/// `submit` must never block the caller: a sink that cannot take the frame
/// right now rejects it.
pub trait FrameSink: Send {
    fn submit(&self, frame: Frame) -> Result<(), FrameRejected>;
}
