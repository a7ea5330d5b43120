//! YOLO face detector using ONNX Runtime via `ort`.
//!
//! Letterboxes the frame to the model's square input, runs inference and
//! reduces the raw boxes with greedy NMS. Regions are returned in descending
//! score order, clamped to the frame.
use std::path::Path;

use crate::recognition::domain::face_detector::FaceDetector;
use crate::shared::frame::Frame;
use crate::shared::math::bbox_iou;
use crate::shared::region::DetectionRegion;

use super::execution_provider::build_session;

/// Fallback model input resolution when the model doesn't specify dimensions.
const DEFAULT_INPUT_SIZE: u32 = 640;

/// Default confidence threshold for face detection.
pub const DEFAULT_CONFIDENCE: f64 = 0.25;

const NMS_IOU_THRESH: f64 = 0.45;

/// Padding value used by YOLO letterboxing.
const PAD_GRAY: f32 = 114.0 / 255.0;

pub struct OnnxYoloDetector {
    session: ort::session::Session,
    confidence: f64,
    input_size: u32,
}

impl OnnxYoloDetector {
    /// Load a YOLO ONNX model.
    ///
    /// The input resolution is read from the model's NCHW input shape and
    /// falls back to 640 when the shape is dynamic.
    pub fn new(model_path: &Path, confidence: f64) -> Result<Self, Box<dyn std::error::Error>> {
        let session = build_session(model_path)?;

        let input_size = session
            .inputs()
            .first()
            .and_then(|input| match input.dtype() {
                ort::value::ValueType::Tensor { shape, .. } if shape.len() >= 4 && shape[2] > 0 => {
                    Some(shape[2] as u32)
                }
                _ => None,
            })
            .unwrap_or(DEFAULT_INPUT_SIZE);

        log::debug!("YOLO detector loaded from {} ({input_size}px input)", model_path.display());

        Ok(Self {
            session,
            confidence,
            input_size,
        })
    }
}

impl FaceDetector for OnnxYoloDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<DetectionRegion>, Box<dyn std::error::Error>> {
        let mut lb = letterbox(frame, self.input_size)?;

        let input_value = ort::value::Tensor::from_array(std::mem::take(&mut lb.tensor))?;
        let outputs = self.session.run(ort::inputs![input_value])?;
        if outputs.len() == 0 {
            return Err("YOLO model produced no outputs".into());
        }
        let tensor = outputs[0].try_extract_array::<f32>()?;
        let shape = tensor.shape().to_vec();
        if shape.len() != 3 {
            return Err(format!("Unexpected YOLO output shape: {shape:?}").into());
        }

        // Output is [1, features, detections] or [1, detections, features].
        let transposed = shape[1] < shape[2];
        let (num_dets, num_feats) = if transposed {
            (shape[2], shape[1])
        } else {
            (shape[1], shape[2])
        };
        if num_feats < 5 {
            return Err(format!("YOLO output has {num_feats} features per box").into());
        }

        let data = tensor.as_slice().ok_or("Cannot get tensor slice")?;
        let at = |det: usize, feat: usize| -> f64 {
            let i = if transposed {
                feat * num_dets + det
            } else {
                det * num_feats + feat
            };
            data[i] as f64
        };

        let mut candidates = Vec::new();
        for i in 0..num_dets {
            let conf = at(i, 4);
            if conf < self.confidence {
                continue;
            }
            let (cx, cy, w, h) = (at(i, 0), at(i, 1), at(i, 2), at(i, 3));
            candidates.push(Candidate {
                bbox: [
                    lb.unmap_x(cx - w / 2.0),
                    lb.unmap_y(cy - h / 2.0),
                    lb.unmap_x(cx + w / 2.0),
                    lb.unmap_y(cy + h / 2.0),
                ],
                confidence: conf,
            });
        }

        let regions = nms(&mut candidates, NMS_IOU_THRESH)
            .into_iter()
            .filter_map(|c| {
                let [x1, y1, x2, y2] = c.bbox;
                DetectionRegion::from_corners(
                    (x1, y1, x2, y2),
                    c.confidence,
                    frame.width(),
                    frame.height(),
                )
            })
            .collect();
        Ok(regions)
    }
}

// ---------------------------------------------------------------------------
// Preprocessing
// ---------------------------------------------------------------------------

struct Letterbox {
    tensor: ndarray::Array4<f32>,
    scale: f64,
    pad_x: u32,
    pad_y: u32,
}

impl Letterbox {
    fn unmap_x(&self, x: f64) -> f64 {
        (x - self.pad_x as f64) / self.scale
    }

    fn unmap_y(&self, y: f64) -> f64 {
        (y - self.pad_y as f64) / self.scale
    }
}

/// Letterbox-resize a frame to `target_size` x `target_size`, NCHW in [0, 1].
///
/// Single-channel frames are replicated to three channels.
fn letterbox(frame: &Frame, target_size: u32) -> Result<Letterbox, Box<dyn std::error::Error>> {
    let fw = frame.width() as f64;
    let fh = frame.height() as f64;
    let target = target_size as f64;

    let scale = (target / fw).min(target / fh);
    let new_w = ((fw * scale).round() as u32).min(target_size);
    let new_h = ((fh * scale).round() as u32).min(target_size);
    let pad_x = (target_size - new_w) / 2;
    let pad_y = (target_size - new_h) / 2;

    let size = target_size as usize;
    let mut tensor = ndarray::Array4::<f32>::from_elem((1, 3, size, size), PAD_GRAY);

    let src = frame.as_ndarray()?;
    let src_h = frame.height() as usize;
    let src_w = frame.width() as usize;
    let channels = frame.channels() as usize;

    for y in 0..new_h as usize {
        let src_y = ((y as f64 / scale) as usize).min(src_h - 1);
        for x in 0..new_w as usize {
            let src_x = ((x as f64 / scale) as usize).min(src_w - 1);
            let ty = pad_y as usize + y;
            let tx = pad_x as usize + x;
            for c in 0..3 {
                let sc = c.min(channels - 1);
                tensor[[0, c, ty, tx]] = src[[src_y, src_x, sc]] as f32 / 255.0;
            }
        }
    }

    Ok(Letterbox {
        tensor,
        scale,
        pad_x,
        pad_y,
    })
}

// ---------------------------------------------------------------------------
// NMS
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
struct Candidate {
    bbox: [f64; 4],
    confidence: f64,
}

/// Greedy NMS: sort by confidence descending, suppress overlapping boxes.
fn nms(dets: &mut [Candidate], iou_thresh: f64) -> Vec<Candidate> {
    dets.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for det in dets.iter() {
        if keep.iter().all(|k| bbox_iou(&k.bbox, &det.bbox) <= iou_thresh) {
            keep.push(det.clone());
        }
    }
    keep
}
