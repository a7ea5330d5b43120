//! ArcFace-style embedding extractor using ONNX Runtime.
//!
//! Crops the detected region, resizes it to the model's 112x112 input and
//! returns the L2-normalized embedding.
use std::path::Path;

use crate::recognition::domain::feature_extractor::FeatureExtractor;
use crate::shared::frame::Frame;
use crate::shared::math::l2_normalize;
use crate::shared::region::DetectionRegion;

use super::execution_provider::build_session;

const INPUT_SIZE: usize = 112;
const NORM_MEAN: f32 = 127.5;
const NORM_STD: f32 = 127.5;

pub struct OnnxEmbeddingExtractor {
    session: ort::session::Session,
}

impl OnnxEmbeddingExtractor {
    pub fn new(model_path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;
        log::debug!("Embedding model loaded from {}", model_path.display());
        Ok(Self { session })
    }
}

impl FeatureExtractor for OnnxEmbeddingExtractor {
    fn extract(
        &mut self,
        frame: &Frame,
        region: &DetectionRegion,
    ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
        let crop = region
            .clamp_to(frame.width(), frame.height())
            .ok_or("Face region lies outside the frame")?;
        let tensor = preprocess(frame, &crop)?;

        let input_value = ort::value::Tensor::from_array(tensor)?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        let embedding_array = outputs[0].try_extract_array::<f32>()?;
        let embedding_slice = embedding_array
            .as_slice()
            .ok_or("Cannot get embedding slice")?;

        let mut embedding = embedding_slice.to_vec();
        l2_normalize(&mut embedding);
        Ok(embedding)
    }
}

/// Sample `crop` of the frame into a normalized 1x3x112x112 tensor.
fn preprocess(
    frame: &Frame,
    crop: &DetectionRegion,
) -> Result<ndarray::Array4<f32>, Box<dyn std::error::Error>> {
    let src = frame.as_ndarray()?;
    let channels = frame.channels() as usize;
    let crop_w = crop.width as f64;
    let crop_h = crop.height as f64;

    let mut tensor = ndarray::Array4::<f32>::zeros((1, 3, INPUT_SIZE, INPUT_SIZE));
    for y in 0..INPUT_SIZE {
        let dy = (((y as f64 + 0.5) * crop_h / INPUT_SIZE as f64) as usize)
            .min(crop.height as usize - 1);
        let src_y = crop.y as usize + dy;
        for x in 0..INPUT_SIZE {
            let dx = (((x as f64 + 0.5) * crop_w / INPUT_SIZE as f64) as usize)
                .min(crop.width as usize - 1);
            let src_x = crop.x as usize + dx;
            for c in 0..3 {
                let value = src[[src_y, src_x, c.min(channels - 1)]] as f32;
                tensor[[0, c, y, x]] = (value - NORM_MEAN) / NORM_STD;
            }
        }
    }
    Ok(tensor)
}
