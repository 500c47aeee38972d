use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::frame::Frame;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunningMode {
    /// Consecutive frames of one video: faces found in the previous frame
    /// are tracked instead of re-detected.
    Stream,
    /// Unrelated still images: always detect, never touch tracking state.
    Image,
}

/// Maps an RGB frame to the mesh landmarks of every face found in it.
///
/// An empty result means no face, which is not an error. Implementations
/// may keep tracking state between `Stream` calls, hence `&mut self`.
pub trait FaceLandmarker: Send {
    fn process(
        &mut self,
        frame: &Frame,
        mode: RunningMode,
    ) -> Result<Vec<FaceLandmarks>, Box<dyn std::error::Error>>;
}
