use crate::shared::frame::Frame;
use crate::shared::region::DetectionRegion;

/// Domain interface for turning a detected face into a feature vector
/// comparable against the identity database.
pub trait FeatureExtractor: Send {
    fn extract(
        &mut self,
        frame: &Frame,
        region: &DetectionRegion,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>>;
}
