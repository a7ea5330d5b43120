pub const YOLO_MODEL_NAME: &str = "yolo11n-pose_widerface.onnx";
pub const YOLO_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/yolo11n-pose_widerface.onnx";

pub const EMBEDDING_MODEL_NAME: &str = "w600k_r50.onnx";
pub const EMBEDDING_MODEL_URL: &str =
    "https://github.com/neutrinographics/faceguard/releases/download/v0.1.0/w600k_r50.onnx";

/// Annotation slots rendered at once (size of the overlay pool).
pub const DEFAULT_MAX_ANNOTATIONS: usize = 10;

/// Minimum cosine similarity for a face to count as a registered identity.
pub const DEFAULT_MATCH_THRESHOLD: f64 = 0.5;

pub const DEFAULT_DATABASE_PATH: &str = "./database/namelist.csv";

pub const UNKNOWN_LABEL: &str = "Unknown";

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];
