pub mod face_detector;
pub mod feature_extractor;
