use std::sync::Arc;

use thiserror::Error;

use crate::identity::identity_database::{IdentityDatabase, QueryError};
use crate::identity::identity_match::{IdentityMatch, ResultBatch};
use crate::identity::identity_record::IdentityRecord;
use crate::recognition::domain::face_detector::FaceDetector;
use crate::recognition::domain::feature_extractor::FeatureExtractor;
use crate::shared::frame::Frame;
use crate::shared::region::DetectionRegion;
use crate::shared::threshold::SharedThreshold;

/// Failure that prevents a whole frame from producing a result batch.
#[derive(Error, Debug)]
pub enum FrameProcessingError {
    #[error("frame {index} is malformed ({width}x{height}x{channels}, {len} bytes)")]
    MalformedFrame {
        index: usize,
        width: u32,
        height: u32,
        channels: u8,
        len: usize,
    },
    #[error("face detection failed on frame {index}: {message}")]
    Detection { index: usize, message: String },
}

/// Failure matching a single region; the region degrades to unknown.
#[derive(Error, Debug)]
pub enum RegionMatchError {
    #[error("feature extraction failed: {0}")]
    Extraction(String),
    #[error(transparent)]
    Query(#[from] QueryError),
}

/// Detects faces in a frame and classifies each against the identity database.
///
/// Runs synchronously; [`RecognitionWorker`](super::worker::RecognitionWorker)
/// moves it onto its own thread.
pub struct Recognizer {
    detector: Box<dyn FaceDetector>,
    extractor: Box<dyn FeatureExtractor>,
    database: Arc<IdentityDatabase>,
    threshold: SharedThreshold,
}

impl Recognizer {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        extractor: Box<dyn FeatureExtractor>,
        database: Arc<IdentityDatabase>,
        threshold: SharedThreshold,
    ) -> Self {
        Self {
            detector,
            extractor,
            database,
            threshold,
        }
    }

    pub fn threshold(&self) -> &SharedThreshold {
        &self.threshold
    }

    pub fn database(&self) -> &Arc<IdentityDatabase> {
        &self.database
    }

    pub fn recognize(&mut self, frame: &Frame) -> Result<ResultBatch, FrameProcessingError> {
        if !frame.is_well_formed() {
            return Err(FrameProcessingError::MalformedFrame {
                index: frame.index(),
                width: frame.width(),
                height: frame.height(),
                channels: frame.channels(),
                len: frame.data().len(),
            });
        }

        let regions = self
            .detector
            .detect(frame)
            .map_err(|e| FrameProcessingError::Detection {
                index: frame.index(),
                message: e.to_string(),
            })?;

        let matches = regions
            .into_iter()
            .map(|region| self.classify(frame, region))
            .collect();

        Ok(ResultBatch::new(frame.index(), frame.timestamp(), matches))
    }

    fn classify(&mut self, frame: &Frame, region: DetectionRegion) -> IdentityMatch {
        match self.best_match(frame, &region) {
            Ok(Some((record, confidence))) if self.threshold.accepts(confidence) => {
                IdentityMatch::identified(region, record, confidence)
            }
            Ok(_) => IdentityMatch::unknown(region),
            Err(e) => {
                log::debug!(
                    "Frame {}: region at ({}, {}) treated as unknown: {e}",
                    frame.index(),
                    region.x,
                    region.y
                );
                IdentityMatch::unknown(region)
            }
        }
    }

    fn best_match(
        &mut self,
        frame: &Frame,
        region: &DetectionRegion,
    ) -> Result<Option<(Arc<IdentityRecord>, f64)>, RegionMatchError> {
        if self.database.is_empty() {
            return Ok(None);
        }
        let features = self
            .extractor
            .extract(frame, region)
            .map_err(|e| RegionMatchError::Extraction(e.to_string()))?;
        let hit = self.database.query(&features)?;
        Ok(hit.map(|h| (h.record, h.confidence)))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Detector returning a fixed list of regions, or an error.
    pub(crate) struct FixedDetector {
        pub regions: Vec<DetectionRegion>,
        pub fail: bool,
    }

    impl FaceDetector for FixedDetector {
        fn detect(
            &mut self,
            _frame: &Frame,
        ) -> Result<Vec<DetectionRegion>, Box<dyn std::error::Error>> {
            if self.fail {
                return Err("detector exploded".into());
            }
            Ok(self.regions.clone())
        }
    }

    /// Extractor that maps a region's x coordinate to a preset feature vector.
    pub(crate) struct LookupExtractor {
        pub by_x: Vec<(i32, Vec<f32>)>,
    }

    impl FeatureExtractor for LookupExtractor {
        fn extract(
            &mut self,
            _frame: &Frame,
            region: &DetectionRegion,
        ) -> Result<Vec<f32>, Box<dyn std::error::Error>> {
            self.by_x
                .iter()
                .find(|(x, _)| *x == region.x)
                .map(|(_, f)| f.clone())
                .ok_or_else(|| "no features for region".into())
        }
    }

    pub(crate) fn frame(index: usize) -> Frame {
        Frame::new(vec![0u8; 64 * 48 * 3], 64, 48, 3, index)
    }

    fn database() -> Arc<IdentityDatabase> {
        Arc::new(
            IdentityDatabase::from_records(vec![
                IdentityRecord::new("Alice", vec![], vec![1.0, 0.0]),
                IdentityRecord::new("Bob", vec![], vec![0.0, 1.0]),
            ])
            .unwrap(),
        )
    }

    fn recognizer(regions: Vec<DetectionRegion>, threshold: f64) -> Recognizer {
        let extractor = LookupExtractor {
            by_x: vec![
                (0, vec![1.0, 0.0]),
                (10, vec![0.6, 0.8]),
                // wrong dimension
                (20, vec![1.0, 0.0, 0.0]),
            ],
        };
        Recognizer::new(
            Box::new(FixedDetector {
                regions,
                fail: false,
            }),
            Box::new(extractor),
            database(),
            SharedThreshold::new(threshold),
        )
    }

    #[test]
    fn test_classifies_regions_in_detector_order() {
        let regions = vec![
            DetectionRegion::new(10, 0, 5, 5),
            DetectionRegion::new(0, 0, 5, 5),
        ];
        let mut r = recognizer(regions.clone(), 0.5);

        let batch = r.recognize(&frame(7)).unwrap();

        assert_eq!(batch.frame_index, 7);
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.matches[0].region, regions[0]);
        assert_eq!(batch.matches[0].display_string(), "Bob");
        assert_relative_eq!(batch.matches[0].confidence().unwrap(), 0.8, epsilon = 1e-6);
        assert_eq!(batch.matches[1].display_string(), "Alice");
    }

    #[test]
    fn test_below_threshold_is_unknown() {
        let mut r = recognizer(vec![DetectionRegion::new(10, 0, 5, 5)], 0.9);
        let batch = r.recognize(&frame(0)).unwrap();
        assert!(batch.matches[0].is_unknown());
        assert_eq!(batch.matches[0].confidence(), None);
    }

    #[test]
    fn test_threshold_change_applies_to_next_frame() {
        let mut r = recognizer(vec![DetectionRegion::new(10, 0, 5, 5)], 0.5);
        let ui_threshold = r.threshold().clone();

        assert!(!r.recognize(&frame(0)).unwrap().matches[0].is_unknown());
        ui_threshold.set(0.95);
        assert!(r.recognize(&frame(1)).unwrap().matches[0].is_unknown());
    }

    #[test]
    fn test_region_failures_degrade_to_unknown() {
        let regions = vec![
            DetectionRegion::new(0, 0, 5, 5),
            DetectionRegion::new(20, 0, 5, 5), // dimension mismatch
            DetectionRegion::new(30, 0, 5, 5), // extractor error
        ];
        let mut r = recognizer(regions, 0.5);

        let batch = r.recognize(&frame(0)).unwrap();

        assert_eq!(batch.len(), 3);
        assert!(!batch.matches[0].is_unknown());
        assert!(batch.matches[1].is_unknown());
        assert!(batch.matches[2].is_unknown());
    }

    #[test]
    fn test_detector_failure_skips_frame() {
        let mut r = Recognizer::new(
            Box::new(FixedDetector {
                regions: vec![],
                fail: true,
            }),
            Box::new(LookupExtractor { by_x: vec![] }),
            database(),
            SharedThreshold::new(0.5),
        );
        assert!(matches!(
            r.recognize(&frame(3)),
            Err(FrameProcessingError::Detection { index: 3, .. })
        ));
    }

    #[test]
    fn test_malformed_frame_skipped() {
        let mut r = recognizer(vec![DetectionRegion::new(0, 0, 5, 5)], 0.5);
        let bad = Frame::new(vec![0u8; 5], 64, 48, 3, 1);
        assert!(matches!(
            r.recognize(&bad),
            Err(FrameProcessingError::MalformedFrame { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_database_classifies_everything_unknown() {
        let mut r = Recognizer::new(
            Box::new(FixedDetector {
                regions: vec![DetectionRegion::new(0, 0, 5, 5)],
                fail: false,
            }),
            Box::new(LookupExtractor {
                by_x: vec![(0, vec![1.0, 0.0])],
            }),
            Arc::new(IdentityDatabase::empty()),
            SharedThreshold::new(0.0),
        );
        let batch = r.recognize(&frame(0)).unwrap();
        assert!(batch.matches[0].is_unknown());
    }

    #[test]
    fn test_no_faces_gives_empty_batch() {
        let mut r = recognizer(vec![], 0.5);
        assert!(r.recognize(&frame(0)).unwrap().is_empty());
    }
}
