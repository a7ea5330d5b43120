use crate::shared::frame::Frame;
use crate::shared::region::DetectionRegion;

/// Domain interface for face detection.
///
/// Regions are returned in the detector's own output order, which is the
/// order results are annotated in. Implementations may be stateful, hence
/// `&mut self`.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame)
        -> Result<Vec<DetectionRegion>, Box<dyn std::error::Error>>;
}
