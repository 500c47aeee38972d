//! Rotated region of interest handed to the mesh network.
//!
//! The ROI is squared on its long side in pixel space and enlarged so the
//! whole face (forehead to chin) fits, then rotated so the eye line is
//! horizontal inside the crop.

use std::f64::consts::PI;

use crate::detection::domain::face_detection::{FaceDetection, LEFT_EYE, RIGHT_EYE};
use crate::detection::domain::face_landmarks::FaceLandmarks;
use crate::shared::constants::{ROI_ROTATION_END, ROI_ROTATION_START};

/// Enlargement applied to both detection boxes and landmark boxes.
pub const ROI_SCALE: f64 = 1.5;

/// Rotated rectangle in normalized frame coordinates.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FaceRoi {
    pub x_center: f64,
    pub y_center: f64,
    pub width: f64,
    pub height: f64,
    /// Clockwise rotation in radians, within `[-PI, PI)`.
    pub rotation: f64,
}

impl FaceRoi {
    pub fn from_detection(det: &FaceDetection, frame_w: u32, frame_h: u32) -> Self {
        let (x_center, y_center) = det.center();
        let rotation = rotation_between(
            det.keypoints[RIGHT_EYE],
            det.keypoints[LEFT_EYE],
            frame_w,
            frame_h,
        );
        FaceRoi {
            x_center,
            y_center,
            width: det.width,
            height: det.height,
            rotation,
        }
        .square_long(frame_w, frame_h)
        .scaled(ROI_SCALE)
    }

    /// ROI for the next frame, derived from this frame's landmarks.
    ///
    /// Returns `None` when the eye-corner landmarks are missing.
    pub fn from_landmarks(landmarks: &FaceLandmarks, frame_w: u32, frame_h: u32) -> Option<Self> {
        let start = landmarks.get(ROI_ROTATION_START)?;
        let end = landmarks.get(ROI_ROTATION_END)?;
        let [x1, y1, x2, y2] = landmarks.bounding_box()?;
        let rotation = rotation_between((start.x, start.y), (end.x, end.y), frame_w, frame_h);
        Some(
            FaceRoi {
                x_center: (x1 + x2) / 2.0,
                y_center: (y1 + y2) / 2.0,
                width: x2 - x1,
                height: y2 - y1,
                rotation,
            }
            .square_long(frame_w, frame_h)
            .scaled(ROI_SCALE),
        )
    }

    /// Unrotated `[x1, y1, x2, y2]`, used to associate ROIs with detections.
    pub fn bounding_box(&self) -> [f64; 4] {
        [
            self.x_center - self.width / 2.0,
            self.y_center - self.height / 2.0,
            self.x_center + self.width / 2.0,
            self.y_center + self.height / 2.0,
        ]
    }

    /// Maps a point given in ROI-local coordinates (`(0, 0)` top-left of the
    /// crop, `(1, 1)` bottom-right) to normalized frame coordinates.
    ///
    /// Rotation happens in pixel space so non-square frames stay undistorted.
    pub fn project(&self, u: f64, v: f64, frame_w: u32, frame_h: u32) -> (f64, f64) {
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        let lx = (u - 0.5) * self.width * fw;
        let ly = (v - 0.5) * self.height * fh;
        let (sin, cos) = self.rotation.sin_cos();
        let px = self.x_center * fw + cos * lx - sin * ly;
        let py = self.y_center * fh + sin * lx + cos * ly;
        (px / fw, py / fh)
    }

    fn square_long(self, frame_w: u32, frame_h: u32) -> Self {
        let fw = frame_w as f64;
        let fh = frame_h as f64;
        let long_side = (self.width * fw).max(self.height * fh);
        FaceRoi {
            width: long_side / fw,
            height: long_side / fh,
            ..self
        }
    }

    fn scaled(self, factor: f64) -> Self {
        FaceRoi {
            width: self.width * factor,
            height: self.height * factor,
            ..self
        }
    }
}

/// Angle that turns the `start → end` vector horizontal.
fn rotation_between(start: (f64, f64), end: (f64, f64), frame_w: u32, frame_h: u32) -> f64 {
    let dx = (end.0 - start.0) * frame_w as f64;
    let dy = (end.1 - start.1) * frame_h as f64;
    normalize_radians(-(-dy).atan2(dx))
}

pub fn normalize_radians(angle: f64) -> f64 {
    angle - 2.0 * PI * ((angle + PI) / (2.0 * PI)).floor()
}
