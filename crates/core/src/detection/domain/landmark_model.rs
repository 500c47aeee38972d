use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::face_roi::FaceRoi;
use crate::shared::frame::Frame;

/// Runs the mesh network on one region of an RGB frame.
///
/// Returned landmarks are normalized to the whole frame, not the ROI.
pub trait LandmarkModel: Send {
    fn run(
        &mut self,
        frame: &Frame,
        roi: &FaceRoi,
    ) -> Result<FaceLandmarks, Box<dyn std::error::Error>>;
}
