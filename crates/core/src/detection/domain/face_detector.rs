use crate::detection::domain::face_detection::FaceDetection;
use crate::shared::frame::Frame;

/// Domain interface for face detection.
///
/// Returns detections ordered by descending score. The frame must be RGB.
pub trait FaceDetector: Send {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<FaceDetection>, Box<dyn std::error::Error>>;
}
