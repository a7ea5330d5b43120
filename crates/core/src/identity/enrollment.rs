use thiserror::Error;

use crate::identity::identity_record::{IdentityRecord, FIELD_DELIMITER};
use crate::recognition::domain::face_detector::FaceDetector;
use crate::recognition::domain::feature_extractor::FeatureExtractor;
use crate::shared::frame::Frame;
use crate::shared::math::l2_norm;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("field '{0}' cannot be stored in the identity table")]
    InvalidField(String),
    #[error("no face found in the enrollment image")]
    NoFace,
    #[error("face detection failed: {0}")]
    Detection(String),
    #[error("feature extraction failed: {0}")]
    Extraction(String),
    #[error("extracted feature vector is empty or zero")]
    EmptyFeatures,
}

/// Builds an identity record from the largest face in `frame`.
pub fn enroll(
    detector: &mut dyn FaceDetector,
    extractor: &mut dyn FeatureExtractor,
    frame: &Frame,
    label: &str,
    aux: Vec<String>,
) -> Result<IdentityRecord, EnrollError> {
    let label = label.trim();
    if !is_storable(label) || label.starts_with('#') {
        return Err(EnrollError::InvalidField(label.to_string()));
    }
    if let Some(bad) = aux.iter().find(|a| !is_storable(a.trim())) {
        return Err(EnrollError::InvalidField(bad.clone()));
    }

    let regions = detector
        .detect(frame)
        .map_err(|e| EnrollError::Detection(e.to_string()))?;
    let face = regions
        .iter()
        .max_by_key(|r| r.area())
        .ok_or(EnrollError::NoFace)?;

    let features = extractor
        .extract(frame, face)
        .map_err(|e| EnrollError::Extraction(e.to_string()))?;
    if features.is_empty() || l2_norm(&features) == 0.0 {
        return Err(EnrollError::EmptyFeatures);
    }

    log::info!("Enrolled '{label}' from a {}x{} face", face.width, face.height);
    Ok(IdentityRecord::new(label, aux, features))
}

/// Whether `field` survives a write/load cycle of the identity table.
fn is_storable(field: &str) -> bool {
    !field.is_empty() && !field.contains(FIELD_DELIMITER) && !field.contains(['\n', '\r'])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::recognizer::tests::{frame, FixedDetector, LookupExtractor};
    use crate::shared::region::DetectionRegion;

    fn extractor() -> LookupExtractor {
        LookupExtractor {
            by_x: vec![(0, vec![1.0, 0.0]), (50, vec![0.0, 2.0]), (90, vec![0.0, 0.0])],
        }
    }

    #[test]
    fn test_picks_largest_face() {
        let mut detector = FixedDetector {
            regions: vec![
                DetectionRegion::new(0, 0, 10, 10),
                DetectionRegion::new(50, 0, 20, 20),
            ],
            fail: false,
        };
        let record = enroll(
            &mut detector,
            &mut extractor(),
            &frame(0),
            " Dana ",
            vec!["Guest".to_string()],
        )
        .unwrap();

        assert_eq!(record.label(), "Dana");
        assert_eq!(record.aux(), ["Guest".to_string()]);
        assert_eq!(record.features(), [0.0, 1.0]);
    }

    #[test]
    fn test_no_face() {
        let mut detector = FixedDetector {
            regions: vec![],
            fail: false,
        };
        let err = enroll(&mut detector, &mut extractor(), &frame(0), "Dana", vec![]).unwrap_err();
        assert!(matches!(err, EnrollError::NoFace));
    }

    #[test]
    fn test_zero_features_rejected() {
        let mut detector = FixedDetector {
            regions: vec![DetectionRegion::new(90, 0, 10, 10)],
            fail: false,
        };
        let err = enroll(&mut detector, &mut extractor(), &frame(0), "Dana", vec![]).unwrap_err();
        assert!(matches!(err, EnrollError::EmptyFeatures));
    }

    #[test]
    fn test_label_with_delimiter_rejected() {
        let mut detector = FixedDetector {
            regions: vec![DetectionRegion::new(0, 0, 10, 10)],
            fail: false,
        };
        let err = enroll(&mut detector, &mut extractor(), &frame(0), "Doe, Jane", vec![])
            .unwrap_err();
        assert!(matches!(err, EnrollError::InvalidField(_)));
    }

    #[test]
    fn test_detector_error_reported() {
        let mut detector = FixedDetector {
            regions: vec![],
            fail: true,
        };
        let err = enroll(&mut detector, &mut extractor(), &frame(0), "Dana", vec![]).unwrap_err();
        assert!(matches!(err, EnrollError::Detection(_)));
    }
}
