pub const DETECTOR_MODEL_NAME: &str = "face_detection_short_range.onnx";
pub const LANDMARK_MODEL_NAME: &str = "face_landmark.onnx";
/// Attention mesh variant: 468 mesh points followed by 10 iris points.
pub const REFINED_LANDMARK_MODEL_NAME: &str = "face_landmark_with_attention.onnx";

pub const MESH_LANDMARKS: usize = 468;
pub const REFINED_MESH_LANDMARKS: usize = 478;

/// Mesh topology indices read by the extractor.
pub const UPPER_LIP: usize = 0;
pub const NOSE_TIP: usize = 2;
pub const LOWER_LIP: usize = 17;

/// Eye corners used to orient the tracking ROI.
pub const ROI_ROTATION_START: usize = 33;
pub const ROI_ROTATION_END: usize = 263;

pub const DEFAULT_DEVICE: &str = "0";
pub const DEFAULT_MAX_NUM_FACES: usize = 1;
pub const DEFAULT_MIN_DETECTION_CONFIDENCE: f64 = 0.5;
pub const DEFAULT_MIN_TRACKING_CONFIDENCE: f64 = 0.5;

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "tif", "webp"];

/// Directory name under the platform cache/config dirs.
pub const APP_DIR_NAME: &str = "Facemark";
