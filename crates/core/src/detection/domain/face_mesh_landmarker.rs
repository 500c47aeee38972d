use crate::detection::domain::face_detector::FaceDetector;
use crate::detection::domain::face_landmarker::{FaceLandmarker, RunningMode};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::detection::domain::face_roi::FaceRoi;
use crate::detection::domain::landmark_model::LandmarkModel;
use crate::detection::infrastructure::math::bbox_iou;
use crate::shared::frame::{Frame, PixelFormat};

/// A detection whose ROI overlaps a tracked ROI by more than this is the
/// same face and is not added again.
const TRACKED_OVERLAP_IOU: f64 = 0.5;

/// Two-stage face mesh: a detector proposes faces, the landmark network
/// refines each one.
///
/// In [`RunningMode::Stream`] the landmarks of one frame define the ROIs of
/// the next, so the detector only runs while fewer than `max_num_faces`
/// faces are tracked.
pub struct FaceMeshLandmarker {
    detector: Box<dyn FaceDetector>,
    model: Box<dyn LandmarkModel>,
    max_num_faces: usize,
    min_tracking_confidence: f64,
    tracked: Vec<FaceRoi>,
}

impl FaceMeshLandmarker {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        model: Box<dyn LandmarkModel>,
        max_num_faces: usize,
        min_tracking_confidence: f64,
    ) -> Self {
        Self {
            detector,
            model,
            max_num_faces,
            min_tracking_confidence,
            tracked: Vec::new(),
        }
    }

    /// ROIs to run the landmark network on: tracked faces first, then new
    /// detections in score order.
    fn collect_rois(
        &mut self,
        frame: &Frame,
        mode: RunningMode,
    ) -> Result<Vec<FaceRoi>, Box<dyn std::error::Error>> {
        let tracked: &[FaceRoi] = match mode {
            RunningMode::Stream => self.tracked.as_slice(),
            RunningMode::Image => &[],
        };
        let mut rois = tracked.to_vec();
        if rois.len() >= self.max_num_faces {
            return Ok(rois);
        }

        let detections = self.detector.detect(frame)?;
        for det in &detections {
            if rois.len() >= self.max_num_faces {
                break;
            }
            let roi = FaceRoi::from_detection(det, frame.width(), frame.height());
            let bbox = roi.bounding_box();
            let already_tracked = tracked
                .iter()
                .any(|t| bbox_iou(&t.bounding_box(), &bbox) > TRACKED_OVERLAP_IOU);
            if !already_tracked {
                rois.push(roi);
            }
        }
        Ok(rois)
    }
}

impl FaceLandmarker for FaceMeshLandmarker {
    fn process(
        &mut self,
        frame: &Frame,
        mode: RunningMode,
    ) -> Result<Vec<FaceLandmarks>, Box<dyn std::error::Error>> {
        if frame.format() != PixelFormat::Rgb24 {
            return Err("face landmarker expects an RGB frame".into());
        }

        let rois = self.collect_rois(frame, mode)?;

        let mut faces = Vec::with_capacity(rois.len());
        let mut next_tracked = Vec::with_capacity(rois.len());
        for roi in &rois {
            let landmarks = self.model.run(frame, roi)?;
            if landmarks.presence() < self.min_tracking_confidence {
                log::trace!(
                    "Frame {}: dropping face with presence {:.3}",
                    frame.index(),
                    landmarks.presence()
                );
                continue;
            }
            if let Some(next) = FaceRoi::from_landmarks(&landmarks, frame.width(), frame.height())
            {
                next_tracked.push(next);
            }
            faces.push(landmarks);
        }

        if mode == RunningMode::Stream {
            if self.tracked.len() != next_tracked.len() {
                log::debug!(
                    "Frame {}: tracking {} face(s)",
                    frame.index(),
                    next_tracked.len()
                );
            }
            self.tracked = next_tracked;
        }

        Ok(faces)
    }
}
